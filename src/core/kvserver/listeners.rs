// src/core/kvserver/listeners.rs

//! The three accept loops a KV server runs: client ops, peer ops
//! (replication and recovery streams), and coordinator control commands.
//! Each handles exactly one request per connection and then closes it
//! (spec.md §6), except the peer listener, which stays open for the
//! lifetime of the forwarding/streaming link on the other end.

use super::ops::handle_client_op;
use super::recovery::handle_ctrl_cmd;
use super::state::ServerState;
use crate::core::protocol::{Message, MessageCodec, PeerOp, Status, TableTarget};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

pub async fn run_client_listener(listener: TcpListener, state: Arc<ServerState>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "client listener accept failed");
                continue;
            }
        };
        let state = state.clone();
        tokio::spawn(async move {
            let mut framed = Framed::new(stream, MessageCodec);
            let Some(Ok(Message::OpReq { op })) = framed.next().await else {
                debug!(%peer, "client connection closed without a valid op");
                return;
            };
            let (status, value) = handle_client_op(&state, op).await;
            let _ = framed.send(Message::OpResp { status, value }).await;
        });
    }
}

/// Handles one peer connection: a sequence of `PeerOp::Put` writes ending
/// in a `Noop` sentinel, each acked before the next arrives. Covers both
/// ordinary forwarded replication (one PUT per connection lifetime is not
/// assumed — a primary keeps its forwarding socket open across many PUTs)
/// and a recovery stream (many PUTs followed by `Noop`).
pub async fn run_peer_listener(listener: TcpListener, state: Arc<ServerState>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "peer listener accept failed");
                continue;
            }
        };
        let state = state.clone();
        tokio::spawn(async move {
            let mut framed = Framed::new(stream, MessageCodec);
            while let Some(frame) = framed.next().await {
                let op = match frame {
                    Ok(Message::PeerOpReq { op }) => op,
                    Ok(_) => {
                        warn!(%peer, "unexpected message on peer link");
                        continue;
                    }
                    Err(e) => {
                        debug!(%peer, error = %e, "peer connection read error");
                        break;
                    }
                };
                let status = match op {
                    PeerOp::Noop => Status::Success,
                    PeerOp::Put { key, value, target } => {
                        let table = match target {
                            TableTarget::Primary => &state.primary,
                            TableTarget::Secondary => &state.secondary,
                        };
                        table.insert(key.into(), value.into());
                        Status::Success
                    }
                };
                if framed.send(Message::PeerOpResp { status }).await.is_err() {
                    break;
                }
            }
            debug!(%peer, "peer connection closed");
        });
    }
}

pub async fn run_ctrl_listener(listener: TcpListener, state: Arc<ServerState>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "control listener accept failed");
                continue;
            }
        };
        let state = state.clone();
        tokio::spawn(async move {
            let mut framed = Framed::new(stream, MessageCodec);
            let Some(Ok(Message::ServerCtrlReq { cmd })) = framed.next().await else {
                debug!(%peer, "coordinator connection closed without a valid command");
                return;
            };
            let status = handle_ctrl_cmd(&state, cmd).await;
            let _ = framed.send(Message::ServerCtrlResp { status }).await;
        });
    }
}
