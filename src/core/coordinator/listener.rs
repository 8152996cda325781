// src/core/coordinator/listener.rs

//! The coordinator's two inbound listeners: the client-facing locate
//! service, and the long-lived server control link that carries heartbeats
//! and recovery acks. Both are thin — they decode a frame, translate it
//! into an [`Event`], and hand it to the single event-loop task that owns
//! all mutable coordinator state; neither listener ever touches the server
//! table itself. Mirrors how the teacher's listener tasks only parse and
//! forward, leaving state mutation to the owning task.

use super::Event;
use crate::core::protocol::{Message, MessageCodec, ServerCtrlMsg};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::Framed;
use tracing::{debug, warn};

/// Accepts client connections and answers each with exactly one `LocateResp`
/// (spec.md §6: "one request per client↔server connection").
pub async fn run_locate_listener(listener: TcpListener, events: mpsc::Sender<Event>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "locate listener accept failed");
                continue;
            }
        };
        let events = events.clone();
        tokio::spawn(async move {
            let mut framed = Framed::new(stream, MessageCodec);
            let Some(Ok(Message::LocateReq { key })) = framed.next().await else {
                debug!(%peer, "locate connection closed without a valid request");
                return;
            };
            let (reply_tx, reply_rx) = oneshot::channel();
            if events
                .send(Event::Locate {
                    key: key.into(),
                    reply: reply_tx,
                })
                .await
                .is_err()
            {
                return;
            }
            if let Ok((host, client_port)) = reply_rx.await {
                let _ = framed
                    .send(Message::LocateResp { host, client_port })
                    .await;
            }
        });
    }
}

/// Accepts the long-lived control connections servers open at startup and
/// keep open for their lifetime, forwarding every `MServerCtrlReq` as an
/// [`Event`]. One accepted socket serves one server for as long as that
/// server process lives.
pub async fn run_control_listener(listener: TcpListener, events: mpsc::Sender<Event>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "control listener accept failed");
                continue;
            }
        };
        let events = events.clone();
        tokio::spawn(async move {
            let mut framed = Framed::new(stream, MessageCodec);
            while let Some(frame) = framed.next().await {
                let msg = match frame {
                    Ok(Message::MServerCtrlReq { msg }) => msg,
                    Ok(_) => {
                        warn!(%peer, "unexpected message on control link");
                        continue;
                    }
                    Err(e) => {
                        debug!(%peer, error = %e, "control connection read error");
                        break;
                    }
                };
                let event = match msg {
                    ServerCtrlMsg::Heartbeat { sid } => Event::Heartbeat { sid },
                    ServerCtrlMsg::UpdatedPrimary { sid } => Event::UpdatedPrimary { sid },
                    ServerCtrlMsg::UpdatePrimaryFailed { sid } => Event::UpdatePrimaryFailed { sid },
                    ServerCtrlMsg::UpdatedSecondary { sid } => Event::UpdatedSecondary { sid },
                    ServerCtrlMsg::UpdateSecondaryFailed { sid } => Event::UpdateSecondaryFailed { sid },
                };
                if events.send(event).await.is_err() {
                    return;
                }
            }
            debug!(%peer, "control connection closed");
        });
    }
}
