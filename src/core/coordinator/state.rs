// src/core/coordinator/state.rs

//! The coordinator's view of every server (spec.md §3, "Server node
//! (coordinator's view)"). The whole table is owned by the coordinator's
//! single event-loop task (spec.md §5, "M's server_nodes table — mutated
//! only from M's main event loop"); nothing else ever touches it directly,
//! which is why it is a plain `Vec`, not a `DashMap` — there is exactly one
//! writer and no concurrent access to guard against.

use crate::config::NodeSpec;
use std::time::Instant;
use tokio::sync::oneshot;

/// Logical status of a server, as seen by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Online,
    Failed,
    Recovering,
}

/// Tracks the two acks a recovery waits on (spec.md §4.1 step 5: "Await
/// both `UPDATED_PRIMARY` from S_b and `UPDATE_SECONDARY` from S_c. Order
/// is unspecified; M proceeds only when both arrive.")
#[derive(Debug, Default)]
pub struct RecoveryProgress {
    pub primary_ack: bool,
    pub secondary_ack: bool,
}

impl RecoveryProgress {
    pub fn both_acked(&self) -> bool {
        self.primary_ack && self.secondary_ack
    }
}

/// One entry in the coordinator's server table.
pub struct ServerNode {
    pub spec: NodeSpec,
    pub status: ServerStatus,
    pub last_heartbeat: Instant,
    /// Quiesces locate routing and replication for this shard during the
    /// switch window (spec.md §3 Invariant 4).
    pub ignore_writes: bool,
    /// Set while this node has been asked to stream a key set to a
    /// replacement; holds the id of the shard being recovered, so an
    /// `UPDATED_PRIMARY`/`UPDATED_SECONDARY` ack arriving from this node can
    /// be attributed to the right recovery without a separate lookup table.
    pub pending_stream_for: Option<usize>,
    /// `Some` only while this node's own id is the failed shard currently
    /// being recovered.
    pub recovery: Option<RecoveryProgress>,
    /// Locate requests for this shard deferred while `ignore_writes` is set,
    /// flushed once the switch completes.
    pub pending_locates: Vec<oneshot::Sender<(String, u16)>>,
}

impl ServerNode {
    pub fn new(spec: NodeSpec) -> Self {
        Self {
            spec,
            status: ServerStatus::Online,
            last_heartbeat: Instant::now(),
            ignore_writes: false,
            pending_stream_for: None,
            recovery: None,
            pending_locates: Vec::new(),
        }
    }
}
