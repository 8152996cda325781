// src/core/coordinator/mod.rs

//! The coordinator (`M` in spec.md): a single event-loop task that owns the
//! server table, a failure detector ticking against it, and two listeners
//! (client locate requests, server control link) that only translate wire
//! traffic into [`Event`]s for that loop to act on. Grounded on the
//! teacher's warden — one task owning replication/failover state while
//! satellite tasks feed it events rather than mutating state themselves.

mod client;
mod detector;
mod launcher;
mod listener;
mod recovery;
pub mod state;

pub use launcher::{LaunchArgs, LocalProcessLauncher, ServerLauncher};
pub use state::{ServerNode, ServerStatus};

use crate::config::ClusterTopology;
use crate::core::metrics;
use crate::core::placement::{owner, primary_of, secondary};
use crate::core::protocol::CoordCmd;
use bytes::Bytes;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// Everything the event loop reacts to. Every mutation of the server table
/// happens inside the `handle` method for one of these variants; nothing
/// else ever writes to it (spec.md §5).
pub enum Event {
    Heartbeat { sid: usize },
    UpdatedPrimary { sid: usize },
    UpdatePrimaryFailed { sid: usize },
    UpdatedSecondary { sid: usize },
    UpdateSecondaryFailed { sid: usize },
    Locate {
        key: Bytes,
        reply: oneshot::Sender<(String, u16)>,
    },
    Tick,
    ReplacementSpawned { shard: usize, ok: bool },
    SwitchComplete { shard: usize, ok: bool },
    Shutdown,
}

pub struct Coordinator {
    nodes: Vec<ServerNode>,
    detector_timeout: Duration,
    launcher: Arc<dyn ServerLauncher>,
    events: mpsc::Sender<Event>,
    my_peer_host: String,
    my_peer_port: u16,
}

impl Coordinator {
    fn n(&self) -> usize {
        self.nodes.len()
    }

    fn handle(&mut self, event: Event) -> bool {
        match event {
            Event::Heartbeat { sid } => {
                if let Some(node) = self.nodes.get_mut(sid) {
                    node.last_heartbeat = Instant::now();
                    metrics::HEARTBEATS_RECEIVED_TOTAL
                        .with_label_values(&[&sid.to_string()])
                        .inc();
                }
            }
            Event::UpdatedPrimary { sid } => self.on_stream_ack(sid, true, true),
            Event::UpdatePrimaryFailed { sid } => self.on_stream_ack(sid, true, false),
            Event::UpdatedSecondary { sid } => self.on_stream_ack(sid, false, true),
            Event::UpdateSecondaryFailed { sid } => self.on_stream_ack(sid, false, false),
            Event::Locate { key, reply } => self.handle_locate(key, reply),
            Event::Tick => self.tick(),
            Event::ReplacementSpawned { shard, ok } => self.on_replacement_spawned(shard, ok),
            Event::SwitchComplete { shard, ok } => self.on_switch_complete(shard, ok),
            Event::Shutdown => return false,
        }
        true
    }

    fn handle_locate(&mut self, key: Bytes, reply: oneshot::Sender<(String, u16)>) {
        let a = owner(&key, self.n());
        if self.nodes[a].ignore_writes {
            self.nodes[a].pending_locates.push(reply);
            return;
        }
        let target = if self.nodes[a].status == ServerStatus::Online {
            a
        } else {
            secondary(a, self.n())
        };
        let node = &self.nodes[target];
        let _ = reply.send((node.spec.connect_host().to_string(), node.spec.client_port));
    }

    fn tick(&mut self) {
        let now = Instant::now();
        let mut online = 0u32;
        let mut timed_out = Vec::new();
        for (i, node) in self.nodes.iter().enumerate() {
            if node.status == ServerStatus::Online {
                online += 1;
                if now.duration_since(node.last_heartbeat) > self.detector_timeout {
                    timed_out.push(i);
                }
            }
        }
        metrics::SERVERS_ONLINE.set(online as f64);
        for i in timed_out {
            self.trigger_failure(i);
        }
    }

    fn trigger_failure(&mut self, a: usize) {
        warn!(shard = a, "heartbeat timeout; starting recovery");
        metrics::RECOVERIES_STARTED_TOTAL.inc();
        self.nodes[a].status = ServerStatus::Recovering;
        self.nodes[a].recovery = Some(state::RecoveryProgress::default());

        let b = secondary(a, self.n());
        let c = primary_of(a, self.n());
        self.nodes[b].pending_stream_for = Some(a);
        self.nodes[c].pending_stream_for = Some(a);

        let replacement_spec = self.nodes[a].spec.clone();
        let args = LaunchArgs {
            id: a,
            n: self.n(),
            host: replacement_spec.host.clone(),
            client_port: replacement_spec.client_port,
            peer_port: replacement_spec.peer_port,
            coordinator_port: replacement_spec.coordinator_port,
            coordinator_host: self.my_peer_host.clone(),
            coordinator_peer_port: self.my_peer_port,
        };
        let launcher = self.launcher.clone();
        let events = self.events.clone();
        tokio::spawn(recovery::launch_replacement(launcher, a, args, events));
    }

    fn on_replacement_spawned(&mut self, shard: usize, ok: bool) {
        if !ok {
            self.abort_recovery(shard, "failed to launch replacement process");
            return;
        }
        let b = secondary(shard, self.n());
        let c = primary_of(shard, self.n());
        let replacement = self.nodes[shard].spec.clone();

        let events = self.events.clone();
        tokio::spawn(recovery::send_update_primary(
            self.nodes[b].spec.connect_host().to_string(),
            self.nodes[b].spec.coordinator_port,
            replacement.connect_host().to_string(),
            replacement.peer_port,
            b,
            events,
        ));

        let events = self.events.clone();
        tokio::spawn(recovery::send_update_secondary(
            self.nodes[c].spec.connect_host().to_string(),
            self.nodes[c].spec.coordinator_port,
            replacement.connect_host().to_string(),
            replacement.peer_port,
            c,
            events,
        ));
    }

    /// An `UPDATED_PRIMARY`/`UPDATED_SECONDARY` ack (or its failed
    /// counterpart) arrived from `sid`; attribute it to whichever shard
    /// recovery asked this node to stream, via `pending_stream_for`.
    fn on_stream_ack(&mut self, sid: usize, is_primary_stream: bool, ok: bool) {
        let Some(shard) = self.nodes.get(sid).and_then(|n| n.pending_stream_for) else {
            return;
        };
        self.nodes[sid].pending_stream_for = None;
        if !ok {
            self.abort_recovery(shard, "a recovery peer reported UPDATE_*_FAILED");
            return;
        }
        let Some(progress) = self.nodes[shard].recovery.as_mut() else {
            return;
        };
        if is_primary_stream {
            progress.primary_ack = true;
        } else {
            progress.secondary_ack = true;
        }
        if progress.both_acked() {
            self.begin_switch(shard);
        }
    }

    fn begin_switch(&mut self, a: usize) {
        let b = secondary(a, self.n());
        // Only shard `a`'s own keyspace is quiesced here — `handle_locate`
        // keys `ignore_writes` by the key's owning shard, so flagging node
        // `b` too would also wrongly queue locates for `b`'s own primary
        // keyspace (which has nothing to do with this switch).
        self.nodes[a].ignore_writes = true;

        let replacement = self.nodes[a].spec.clone();
        let new_secondary = self.nodes[secondary(a, self.n())].spec.clone();
        let events = self.events.clone();
        tokio::spawn(recovery::run_switch(
            a,
            self.nodes[b].spec.connect_host().to_string(),
            self.nodes[b].spec.coordinator_port,
            replacement.connect_host().to_string(),
            replacement.coordinator_port,
            new_secondary.connect_host().to_string(),
            new_secondary.peer_port,
            events,
        ));
    }

    fn on_switch_complete(&mut self, a: usize, ok: bool) {
        if !ok {
            self.abort_recovery(a, "switch sequence failed");
            return;
        }
        self.nodes[a].status = ServerStatus::Online;
        self.nodes[a].ignore_writes = false;
        self.nodes[a].recovery = None;
        metrics::RECOVERIES_COMPLETED_TOTAL.inc();
        info!(shard = a, "recovery complete, shard is ONLINE");
        self.flush_pending_locates(a);
    }

    /// Recovery for `shard` cannot proceed. Per spec.md §9, the surviving
    /// secondary (`secondary(shard)`) keeps serving that keyspace
    /// indefinitely; the shard never returns to ONLINE and no further
    /// automatic retry is attempted.
    fn abort_recovery(&mut self, shard: usize, reason: &str) {
        warn!(shard, reason, "recovery aborted");
        metrics::RECOVERIES_ABORTED_TOTAL.inc();
        self.nodes[shard].recovery = None;
        let b = secondary(shard, self.n());
        let c = primary_of(shard, self.n());
        if self.nodes[b].pending_stream_for == Some(shard) {
            self.nodes[b].pending_stream_for = None;
        }
        if self.nodes[c].pending_stream_for == Some(shard) {
            self.nodes[c].pending_stream_for = None;
        }
        self.nodes[shard].ignore_writes = false;
        self.flush_pending_locates(shard);
    }

    fn flush_pending_locates(&mut self, shard: usize) {
        let pending = std::mem::take(&mut self.nodes[shard].pending_locates);
        for reply in pending {
            self.handle_locate_for_flush(shard, reply);
        }
    }

    fn handle_locate_for_flush(&self, shard: usize, reply: oneshot::Sender<(String, u16)>) {
        let target = if self.nodes[shard].status == ServerStatus::Online {
            shard
        } else {
            secondary(shard, self.n())
        };
        let node = &self.nodes[target];
        let _ = reply.send((node.spec.connect_host().to_string(), node.spec.client_port));
    }

    /// Tells every server to stop (spec.md §6: "EOF on standard input
    /// triggers graceful shutdown"). Best-effort and concurrent — a server
    /// that's already down or unreachable just doesn't get the command.
    async fn shutdown_all(&self) {
        let sends = self.nodes.iter().map(|node| {
            let host = node.spec.connect_host().to_string();
            let port = node.spec.coordinator_port;
            async move {
                let _ = client::send_ctrl_cmd(&host, port, CoordCmd::Shutdown).await;
            }
        });
        join_all(sends).await;
    }
}

/// Brings up the cluster and runs the coordinator until shutdown: spawns
/// every server named in the topology, tells each to connect to its
/// secondary partner, then serves locate requests and drives recovery until
/// told to stop.
pub async fn run(
    topology: ClusterTopology,
    client_port: u16,
    peer_port: u16,
    detector_timeout: Duration,
    launcher: Arc<dyn ServerLauncher>,
    my_peer_host: String,
) -> anyhow::Result<()> {
    let n = topology.n();
    let (events_tx, mut events_rx) = mpsc::channel(1024);

    for (i, spec) in topology.nodes.iter().enumerate() {
        let args = LaunchArgs {
            id: i,
            n,
            host: spec.host.clone(),
            client_port: spec.client_port,
            peer_port: spec.peer_port,
            coordinator_port: spec.coordinator_port,
            coordinator_host: my_peer_host.clone(),
            coordinator_peer_port: peer_port,
        };
        launcher.spawn(args).await.ok();
    }

    info!(n, "waiting for all servers to connect their control links");
    tokio::time::sleep(Duration::from_millis(500)).await;

    let client_listener = TcpListener::bind(("0.0.0.0", client_port)).await?;
    let control_listener = TcpListener::bind(("0.0.0.0", peer_port)).await?;
    tokio::spawn(listener::run_locate_listener(client_listener, events_tx.clone()));
    tokio::spawn(listener::run_control_listener(control_listener, events_tx.clone()));
    tokio::spawn(detector::run_ticker(detector_timeout / 4, events_tx.clone()));
    tokio::spawn(run_stdin_watcher(events_tx.clone()));

    let mut coordinator = Coordinator {
        nodes: topology.nodes.into_iter().map(ServerNode::new).collect(),
        detector_timeout,
        launcher,
        events: events_tx.clone(),
        my_peer_host,
        my_peer_port: peer_port,
    };

    for i in 0..n {
        let sec = secondary(i, n);
        let host = coordinator.nodes[sec].spec.connect_host().to_string();
        let port = coordinator.nodes[sec].spec.peer_port;
        let target_host = coordinator.nodes[i].spec.connect_host().to_string();
        let target_coord_port = coordinator.nodes[i].spec.coordinator_port;
        let events = events_tx.clone();
        tokio::spawn(async move {
            // Best-effort: if the server hasn't finished starting yet the
            // control command simply fails and is retried on the next
            // detector tick once the node is marked FAILED for never
            // reporting a heartbeat, so no event is needed here.
            let _ = client::send_ctrl_cmd(
                &target_host,
                target_coord_port,
                crate::core::protocol::CoordCmd::SetSecondary { host, port },
            )
            .await;
            drop(events);
        });
    }

    while let Some(event) = events_rx.recv().await {
        if let Event::Shutdown = event {
            info!("EOF on standard input, shutting down every server");
            coordinator.shutdown_all().await;
            break;
        }
        if !coordinator.handle(event) {
            break;
        }
    }
    Ok(())
}

/// Reads stdin to EOF and emits `Event::Shutdown` (spec.md §6: "EOF on
/// standard input triggers graceful shutdown").
async fn run_stdin_watcher(events: mpsc::Sender<Event>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(_)) => continue,
            Ok(None) | Err(_) => {
                let _ = events.send(Event::Shutdown).await;
                return;
            }
        }
    }
}
