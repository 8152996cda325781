// src/core/kvserver/recovery.rs

//! Server-side handling of coordinator control commands (spec.md §4.1/§4.2):
//! establishing the forwarding link, streaming a key set to a replacement,
//! and the brief quiescence on `SWITCH_PRIMARY`.

use super::state::{RecoveryState, ServerState};
use crate::core::errors::KvError;
use crate::core::protocol::{CoordCmd, Message, MessageCodec, PeerOp, ServerCtrlMsg, Status, TableTarget};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{info, warn};

/// Applies a `SERVER_CTRL_REQ` command and returns the immediate
/// acknowledgement. Work that needs to keep running after the ack — the
/// recovery streams — is spawned as a background task that reports its own
/// completion asynchronously over the control link (`UPDATED_PRIMARY` /
/// `UPDATE_PRIMARY_FAILED`, etc.), matching spec.md's split between a
/// command's receipt ack and its eventual completion ack.
pub async fn handle_ctrl_cmd(state: &Arc<ServerState>, cmd: CoordCmd) -> Status {
    match cmd {
        CoordCmd::SetSecondary { host, port } => match state.set_secondary(host, port).await {
            Ok(()) => {
                state.set_recovery(RecoveryState::Normal);
                Status::CtrlReqSuccess
            }
            Err(e) => {
                warn!(error = %e, "SET_SECONDARY failed to connect");
                Status::CtrlReqFailure
            }
        },
        CoordCmd::UpdatePrimary { host, port } => {
            state.set_recovery(RecoveryState::StreamingPrimary);
            let state = state.clone();
            tokio::spawn(async move {
                let snapshot = state.secondary.snapshot();
                let ok = stream_snapshot(&host, port, TableTarget::Primary, snapshot).await.is_ok();
                let msg = if ok {
                    ServerCtrlMsg::UpdatedPrimary { sid: state.id }
                } else {
                    ServerCtrlMsg::UpdatePrimaryFailed { sid: state.id }
                };
                let _ = state.ack_tx.send(msg).await;
                state.set_recovery(RecoveryState::Normal);
            });
            Status::CtrlReqSuccess
        }
        CoordCmd::UpdateSecondary { host, port } => {
            state.set_recovery(RecoveryState::StreamingSecondary);
            let state = state.clone();
            tokio::spawn(async move {
                let snapshot = state.primary.snapshot();
                let ok = stream_snapshot(&host, port, TableTarget::Secondary, snapshot).await.is_ok();
                let msg = if ok {
                    ServerCtrlMsg::UpdatedSecondary { sid: state.id }
                } else {
                    ServerCtrlMsg::UpdateSecondaryFailed { sid: state.id }
                };
                let _ = state.ack_tx.send(msg).await;
                state.set_recovery(RecoveryState::Normal);
            });
            Status::CtrlReqSuccess
        }
        CoordCmd::SwitchPrimary => {
            state.set_recovery(RecoveryState::SwitchingPrimary);
            info!(id = state.id, "switching off stand-in duty for a recovered shard");
            state.set_recovery(RecoveryState::Normal);
            Status::CtrlReqSuccess
        }
        CoordCmd::Shutdown => {
            let state = state.clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                info!(id = state.id, "shutting down on coordinator request");
                std::process::exit(0);
            });
            Status::CtrlReqSuccess
        }
    }
}

/// Streams every `(key, value)` pair in `snapshot` to `host:port` as
/// `PeerOpReq::Put { target, .. }`, then a `Noop` end-of-stream sentinel
/// (spec.md §4.2).
async fn stream_snapshot(
    host: &str,
    port: u16,
    target: TableTarget,
    snapshot: Vec<(bytes::Bytes, bytes::Bytes)>,
) -> Result<(), KvError> {
    let stream = connect_to_replacement(host, port).await?;
    let mut framed = Framed::new(stream, MessageCodec);
    let count = snapshot.len();
    for (key, value) in snapshot {
        framed
            .send(Message::PeerOpReq {
                op: PeerOp::Put {
                    key: key.to_vec(),
                    value: value.to_vec(),
                    target,
                },
            })
            .await?;
        match framed.next().await {
            Some(Ok(Message::PeerOpResp { status: Status::Success })) => {}
            _ => return Err(KvError::RecoveryPeerFailed("replacement rejected a streamed key".into())),
        }
    }
    framed.send(Message::PeerOpReq { op: PeerOp::Noop }).await?;
    match framed.next().await {
        Some(Ok(Message::PeerOpResp { status: Status::Success })) => {
            info!(count, "recovery stream complete");
            Ok(())
        }
        _ => Err(KvError::RecoveryPeerFailed("replacement did not ack end-of-stream".into())),
    }
}

/// The replacement process was just forked by the coordinator's launcher and
/// may not have bound its peer listener yet; retry briefly instead of
/// failing the whole recovery on that startup race.
async fn connect_to_replacement(host: &str, port: u16) -> Result<TcpStream, KvError> {
    let mut last_err = None;
    for _ in 0..20 {
        match TcpStream::connect((host, port)).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                last_err = Some(e);
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    }
    Err(last_err.expect("loop ran at least once").into())
}
