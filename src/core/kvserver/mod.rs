// src/core/kvserver/mod.rs

//! A KV server process (`S_i` in spec.md): holds a primary set and a
//! secondary set, forwards PUTs synchronously to its secondary partner,
//! participates in recovery streams, and reports its health to the
//! coordinator over a long-lived control link.

mod control;
mod listeners;
mod ops;
mod recovery;
mod replication;
pub mod state;

pub use state::ServerState;

use crate::config::NodeSpec;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::info;

/// Runs a server forever: connects to the coordinator's control link,
/// binds its three listen ports, and serves client ops, peer replication,
/// and coordinator commands until the process is told to stop
/// (`CoordCmd::Shutdown`, handled in `recovery::handle_ctrl_cmd`).
pub async fn run(
    id: usize,
    topology: Vec<NodeSpec>,
    client_port: u16,
    peer_port: u16,
    coordinator_listen_port: u16,
    coordinator_host: String,
    coordinator_port: u16,
    heartbeat_period: Duration,
) -> anyhow::Result<()> {
    let (ack_tx, ack_rx) = mpsc::channel(64);
    let state = Arc::new(ServerState::new(id, topology, ack_tx));

    tokio::spawn(control::run(
        id,
        coordinator_host,
        coordinator_port,
        heartbeat_period,
        ack_rx,
    ));

    let client_listener = TcpListener::bind(("0.0.0.0", client_port)).await?;
    let peer_listener = TcpListener::bind(("0.0.0.0", peer_port)).await?;
    let ctrl_listener = TcpListener::bind(("0.0.0.0", coordinator_listen_port)).await?;

    info!(id, client_port, peer_port, coordinator_listen_port, "server listening");

    let client_task = tokio::spawn(listeners::run_client_listener(client_listener, state.clone()));
    let peer_task = tokio::spawn(listeners::run_peer_listener(peer_listener, state.clone()));
    let ctrl_task = tokio::spawn(listeners::run_ctrl_listener(ctrl_listener, state));

    let _ = tokio::try_join!(client_task, peer_task, ctrl_task);
    Ok(())
}
