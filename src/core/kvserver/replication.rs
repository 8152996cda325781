// src/core/kvserver/replication.rs

//! Synchronous forwarding of a locally-admitted PUT to this server's
//! secondary partner (spec.md §4.2, "PUT path: ... forward synchronously to
//! the secondary holder; the client's response waits for that round trip").

use super::state::ServerState;
use crate::core::errors::KvError;
use crate::core::protocol::{PeerOp, Status, TableTarget};
use bytes::Bytes;

pub async fn forward_put(state: &ServerState, key: Bytes, value: Bytes) -> Result<(), KvError> {
    let op = PeerOp::Put {
        key: key.to_vec(),
        value: value.to_vec(),
        target: TableTarget::Secondary,
    };
    match state.send_to_secondary(op).await? {
        Status::Success => Ok(()),
        other => Err(KvError::RecoveryPeerFailed(format!(
            "secondary rejected forwarded PUT: {other:?}"
        ))),
    }
}
