// src/core/kvserver/state.rs

//! Per-process state for a KV server: its two key tables, the forwarding
//! link to its secondary partner, the per-key lock table used to serialize
//! a PUT with its synchronous forward, and this server's own transitional
//! recovery role.

use crate::config::NodeSpec;
use crate::core::errors::KvError;
use crate::core::kv::KvTable;
use crate::core::protocol::{Message, MessageCodec, PeerOp, ServerCtrlMsg, Status};
use bytes::Bytes;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_util::codec::Framed;

/// This server's own transitional role during a recovery it is
/// participating in (spec.md §3, per-server recovery state). Bookkeeping
/// only — admission of ordinary client ops never depends on it, since a
/// server always serves its own primary set and stands in for a failed
/// neighbor's keyspace out of its secondary set unconditionally (the
/// coordinator is what decides whether a client ever gets routed there).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    Normal,
    StreamingPrimary,
    StreamingSecondary,
    SwitchingPrimary,
}

/// The forwarding connection to this server's secondary partner. Reconnects
/// lazily using the last address `SET_SECONDARY` supplied, since a
/// connection can drop mid-run and spec.md's `RecoveryPeerFailed` error
/// exists precisely to let callers react to this without crashing.
#[derive(Default)]
pub struct SecondaryLink {
    pub target: Option<(String, u16)>,
    pub framed: Option<Framed<TcpStream, MessageCodec>>,
}

pub struct ServerState {
    pub id: usize,
    pub n: usize,
    pub topology: Vec<NodeSpec>,
    pub primary: KvTable,
    pub secondary: KvTable,
    pub secondary_link: AsyncMutex<SecondaryLink>,
    pub put_locks: DashMap<Bytes, Arc<AsyncMutex<()>>>,
    pub recovery: parking_lot::Mutex<RecoveryState>,
    /// Outbound acks/heartbeats, drained by the persistent control-link
    /// task (`control.rs`) and written to the coordinator.
    pub ack_tx: mpsc::Sender<ServerCtrlMsg>,
}

impl ServerState {
    pub fn new(id: usize, topology: Vec<NodeSpec>, ack_tx: mpsc::Sender<ServerCtrlMsg>) -> Self {
        let n = topology.len();
        Self {
            id,
            n,
            topology,
            primary: KvTable::new(),
            secondary: KvTable::new(),
            secondary_link: AsyncMutex::new(SecondaryLink::default()),
            put_locks: DashMap::new(),
            recovery: parking_lot::Mutex::new(RecoveryState::Normal),
            ack_tx,
        }
    }

    /// The async lock serializing concurrent PUTs for the same key, held
    /// across the synchronous forward to the secondary partner (spec.md §5:
    /// the one sanctioned exception to "never hold a lock across a
    /// suspension").
    pub fn put_lock(&self, key: &Bytes) -> Arc<AsyncMutex<()>> {
        self.put_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    pub fn set_recovery(&self, state: RecoveryState) {
        *self.recovery.lock() = state;
    }

    /// Replaces the secondary link's target and eagerly (re)connects,
    /// applying a fresh `SET_SECONDARY` (spec.md §4.1).
    pub async fn set_secondary(&self, host: String, port: u16) -> Result<(), KvError> {
        let stream = TcpStream::connect((host.as_str(), port)).await?;
        let framed = Framed::new(stream, MessageCodec);
        let mut link = self.secondary_link.lock().await;
        link.target = Some((host, port));
        link.framed = Some(framed);
        Ok(())
    }

    /// Sends a single peer op over the secondary link, reconnecting from
    /// the stored target if the connection had previously dropped.
    pub async fn send_to_secondary(&self, op: PeerOp) -> Result<Status, KvError> {
        let mut link = self.secondary_link.lock().await;
        if link.framed.is_none() {
            let (host, port) = link
                .target
                .clone()
                .ok_or_else(|| KvError::RecoveryPeerFailed("no secondary configured".into()))?;
            let stream = TcpStream::connect((host.as_str(), port)).await?;
            link.framed = Some(Framed::new(stream, MessageCodec));
        }
        let framed = link.framed.as_mut().expect("just ensured Some");
        let send_result = framed.send(Message::PeerOpReq { op }).await;
        if send_result.is_err() {
            link.framed = None;
            return Err(KvError::RecoveryPeerFailed("send to secondary failed".into()));
        }
        match framed.next().await {
            Some(Ok(Message::PeerOpResp { status })) => Ok(status),
            _ => {
                link.framed = None;
                Err(KvError::RecoveryPeerFailed("secondary did not reply".into()))
            }
        }
    }
}
