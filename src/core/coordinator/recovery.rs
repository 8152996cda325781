// src/core/coordinator/recovery.rs

//! The recovery steps that need to perform network I/O and therefore cannot
//! run inline in the coordinator's event loop (spec.md §4.1 steps 4-9).
//! Each function here is spawned as a detached task by the event loop and
//! reports its outcome back as an [`Event`]; none of them touch the server
//! table directly, keeping that table single-owner.

use super::client::send_ctrl_cmd;
use super::launcher::{LaunchArgs, ServerLauncher};
use super::Event;
use crate::core::protocol::CoordCmd;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Launches the replacement for a failed shard and reports back whether it
/// started successfully (spec.md §4.1 step 4).
pub async fn launch_replacement(
    launcher: Arc<dyn ServerLauncher>,
    shard: usize,
    args: LaunchArgs,
    events: mpsc::Sender<Event>,
) {
    let ok = launcher.spawn(args).await.is_ok();
    let _ = events.send(Event::ReplacementSpawned { shard, ok }).await;
}

/// Sends `UPDATE_PRIMARY` to S_b, telling it to stream its (shard `a`'s
/// backup) secondary set to the replacement as shard `a`'s new primary set.
/// An immediate connect/send failure is treated the same as a protocol-level
/// `UPDATE_PRIMARY_FAILED` — either way the stream never started.
pub async fn send_update_primary(
    b_host: String,
    b_coord_port: u16,
    replacement_host: String,
    replacement_peer_port: u16,
    b_sid: usize,
    events: mpsc::Sender<Event>,
) {
    let cmd = CoordCmd::UpdatePrimary {
        host: replacement_host,
        port: replacement_peer_port,
    };
    let ok = send_ctrl_cmd(&b_host, b_coord_port, cmd).await.unwrap_or(false);
    if !ok {
        let _ = events.send(Event::UpdatePrimaryFailed { sid: b_sid }).await;
    }
    // On success we wait for the async UPDATED_PRIMARY ack on the control
    // link (spec.md §4.1 step 5) rather than synthesizing one here.
}

/// Sends `UPDATE_SECONDARY` to S_c, telling it to stream its primary set
/// (shard `a`'s old primary copy) to the replacement as its new secondary
/// set.
pub async fn send_update_secondary(
    c_host: String,
    c_coord_port: u16,
    replacement_host: String,
    replacement_peer_port: u16,
    c_sid: usize,
    events: mpsc::Sender<Event>,
) {
    let cmd = CoordCmd::UpdateSecondary {
        host: replacement_host,
        port: replacement_peer_port,
    };
    let ok = send_ctrl_cmd(&c_host, c_coord_port, cmd).await.unwrap_or(false);
    if !ok {
        let _ = events.send(Event::UpdateSecondaryFailed { sid: c_sid }).await;
    }
}

/// Drives the switch sequence once both streams have completed (spec.md
/// §4.1 steps 7-10): tell S_b to stop serving shard `a`'s keyspace and
/// reject writes, then tell the replacement to point its own forwarding
/// connection at its new secondary partner and go live.
pub async fn run_switch(
    shard: usize,
    b_host: String,
    b_coord_port: u16,
    replacement_host: String,
    replacement_coord_port: u16,
    new_secondary_host: String,
    new_secondary_peer_port: u16,
    events: mpsc::Sender<Event>,
) {
    let switched = send_ctrl_cmd(&b_host, b_coord_port, CoordCmd::SwitchPrimary)
        .await
        .unwrap_or(false);
    if !switched {
        let _ = events.send(Event::SwitchComplete { shard, ok: false }).await;
        return;
    }
    info!(shard, "S_b switched off primary duty for this shard");

    let set_secondary = send_ctrl_cmd(
        &replacement_host,
        replacement_coord_port,
        CoordCmd::SetSecondary {
            host: new_secondary_host,
            port: new_secondary_peer_port,
        },
    )
    .await
    .unwrap_or(false);

    let _ = events
        .send(Event::SwitchComplete {
            shard,
            ok: set_secondary,
        })
        .await;
}
