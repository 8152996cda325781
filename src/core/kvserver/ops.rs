// src/core/kvserver/ops.rs

//! Client-facing NOOP/GET/PUT admission (spec.md §4.2). A server always
//! serves its own primary set under its own key; a request for a key it
//! does not own only ever arrives because the coordinator is routing a
//! client to this server as the live failover for a failed neighbor, in
//! which case it is served out of this server's secondary set — the
//! coordinator's locate routing is the only thing that makes such a
//! request possible, so no extra "is that shard actually down" check is
//! needed here.

use super::replication::forward_put;
use super::state::ServerState;
use crate::core::metrics;
use crate::core::placement::{owner, primary_of, HEADER_RESERVE, MAX_MSG_LEN};
use crate::core::protocol::{Op, Status};
use bytes::Bytes;

/// `true` if `key` belongs to this server's own primary set.
fn owns(state: &ServerState, key: &Bytes) -> bool {
    owner(key, state.n) == state.id
}

pub async fn handle_client_op(state: &ServerState, op: Op) -> (Status, Option<Vec<u8>>) {
    match op {
        Op::Noop => (Status::Success, None),
        Op::Get { key } => {
            let key = Bytes::from(key);
            let table = if owns(state, &key) {
                &state.primary
            } else {
                &state.secondary
            };
            match table.get(&key) {
                Some(value) => {
                    metrics::CLIENT_OPS_TOTAL.with_label_values(&["get", "success"]).inc();
                    (Status::Success, Some(value.to_vec()))
                }
                None => {
                    metrics::CLIENT_OPS_TOTAL.with_label_values(&["get", "not_found"]).inc();
                    (Status::KeyNotFound, None)
                }
            }
        }
        Op::Put { key, value } => {
            let key = Bytes::from(key);
            let value = Bytes::from(value);
            let status = if value.len() > MAX_MSG_LEN - HEADER_RESERVE {
                // spec.md §8 boundary case: an oversize value is rejected
                // outright, never silently admitted or truncated.
                Status::ServerFailure
            } else {
                handle_put(state, key, value).await
            };
            let label = if status == Status::Success { "success" } else { "failure" };
            metrics::CLIENT_OPS_TOTAL.with_label_values(&["put", label]).inc();
            (status, None)
        }
    }
}

async fn handle_put(state: &ServerState, key: Bytes, value: Bytes) -> Status {
    let lock = state.put_lock(&key);
    // Held across the forward below: the one case spec.md §5 sanctions
    // holding a lock across an `.await`, so a second PUT for the same key
    // cannot race ahead of this one's replication.
    let _guard = lock.lock().await;

    if owns(state, &key) {
        state.primary.insert(key.clone(), value.clone());
        match forward_put(state, key, value).await {
            Ok(()) => Status::Success,
            Err(_) => {
                metrics::FORWARDED_PUT_FAILURES_TOTAL.inc();
                // The local write already landed, but the client is told it
                // failed (spec.md Open Question: a forward failure fails
                // the client's write rather than silently diverging the
                // replica's view of this key).
                Status::ServerFailure
            }
        }
    } else if owner(&key, state.n) == primary_of(state.id, state.n) {
        // Standing in for a failed neighbor: write into the backup copy,
        // nothing left to forward further.
        state.secondary.insert(key, value);
        Status::Success
    } else {
        // This server's secondary set only ever mirrors
        // `primary_of(id, n)`'s primary set; a key belonging to any other
        // shard has no business here (spec.md §8 boundary case).
        Status::ServerFailure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeSpec;

    fn topology(n: usize) -> Vec<NodeSpec> {
        (0..n)
            .map(|i| NodeSpec {
                host: "localhost".into(),
                client_port: 9000 + i as u16,
                peer_port: 9100 + i as u16,
                coordinator_port: 9200 + i as u16,
            })
            .collect()
    }

    #[tokio::test]
    async fn get_on_empty_table_is_not_found() {
        let state = ServerState::new(0, topology(3), tokio::sync::mpsc::channel(8).0);
        let (status, value) = handle_client_op(&state, Op::Get { key: b"missing".to_vec() }).await;
        assert_eq!(status, Status::KeyNotFound);
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn noop_always_succeeds() {
        let state = ServerState::new(0, topology(3), tokio::sync::mpsc::channel(8).0);
        let (status, _) = handle_client_op(&state, Op::Noop).await;
        assert_eq!(status, Status::Success);
    }

    #[tokio::test]
    async fn put_for_the_mirrored_neighbor_lands_in_the_secondary_table() {
        // Construct a key owned by `primary_of(0, 3)` — the one shard this
        // server's secondary set legitimately mirrors — and confirm the
        // write is admitted into the secondary set rather than rejected.
        let state = ServerState::new(0, topology(3), tokio::sync::mpsc::channel(8).0);
        let mirrored = primary_of(0, 3);
        let mut key = None;
        for candidate in 0u8..=255 {
            let k = Bytes::from(vec![candidate; 16]);
            if owner(&k, 3) == mirrored {
                key = Some(k);
                break;
            }
        }
        let key = key.expect("some byte value must hash to the mirrored shard");
        let (status, _) = handle_client_op(
            &state,
            Op::Put {
                key: key.to_vec(),
                value: b"v".to_vec(),
            },
        )
        .await;
        assert_eq!(status, Status::Success);
        assert_eq!(state.secondary.get(&key), Some(Bytes::from_static(b"v")));
        assert!(state.primary.is_empty());
    }

    #[tokio::test]
    async fn put_for_a_key_this_server_has_no_role_in_is_server_failure() {
        // A key whose owner is neither this server (0) nor the neighbor it
        // mirrors (`primary_of(0, 3)`) has no business on this server at all
        // (spec.md §8 boundary: "PUT whose owner != receiving server
        // returns SERVER_FAILURE").
        let state = ServerState::new(0, topology(3), tokio::sync::mpsc::channel(8).0);
        let mirrored = primary_of(0, 3);
        let mut key = None;
        for candidate in 0u8..=255 {
            let k = Bytes::from(vec![candidate; 16]);
            let o = owner(&k, 3);
            if o != 0 && o != mirrored {
                key = Some(k);
                break;
            }
        }
        let key = key.expect("some byte value must hash to a shard this server has no role in");
        let (status, _) = handle_client_op(
            &state,
            Op::Put {
                key: key.to_vec(),
                value: b"v".to_vec(),
            },
        )
        .await;
        assert_eq!(status, Status::ServerFailure);
        assert!(state.secondary.is_empty());
        assert!(state.primary.is_empty());
    }

    #[tokio::test]
    async fn put_with_an_oversize_value_is_server_failure() {
        // spec.md §8 boundary case: a value too large to fit under
        // `MAX_MSG_LEN - HEADER_RESERVE` is rejected outright.
        let state = ServerState::new(0, topology(3), tokio::sync::mpsc::channel(8).0);
        let mut key = None;
        for candidate in 0u8..=255 {
            let k = Bytes::from(vec![candidate; 16]);
            if owner(&k, 3) == 0 {
                key = Some(k);
                break;
            }
        }
        let key = key.expect("some byte value must hash to shard 0");
        let oversize = vec![0u8; crate::core::placement::MAX_MSG_LEN];
        let (status, _) = handle_client_op(
            &state,
            Op::Put {
                key: key.to_vec(),
                value: oversize,
            },
        )
        .await;
        assert_eq!(status, Status::ServerFailure);
        assert!(state.primary.is_empty());
    }
}
