// src/core/kvserver/control.rs

//! The server's outbound, long-lived control link to the coordinator
//! (spec.md §6: "Control connections are long-lived"). One connection
//! carries every heartbeat and recovery ack this process ever sends; a
//! ticker task and the ack-draining loop share it by taking turns, since
//! `Framed`'s `Sink` half only supports one writer at a time.

use crate::core::protocol::{Message, MessageCodec, ServerCtrlMsg};
use futures::SinkExt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::warn;

/// Connects to the coordinator and runs forever, emitting a heartbeat every
/// `heartbeat_period` and forwarding anything sent on `acks` in between. A
/// send failure tears down the connection and falls back to the
/// connect-with-retry loop — the socket is already broken, so retrying the
/// same `Framed` would just fail again every tick.
pub async fn run(
    id: usize,
    coordinator_host: String,
    coordinator_port: u16,
    heartbeat_period: Duration,
    mut acks: mpsc::Receiver<ServerCtrlMsg>,
) {
    loop {
        let mut framed = connect(&coordinator_host, coordinator_port).await;
        let mut interval = tokio::time::interval(heartbeat_period);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let msg = Message::MServerCtrlReq { msg: ServerCtrlMsg::Heartbeat { sid: id } };
                    if let Err(e) = framed.send(msg).await {
                        warn!(error = %e, "failed to send heartbeat, reconnecting");
                        break;
                    }
                }
                maybe_ack = acks.recv() => {
                    let Some(ack) = maybe_ack else { return };
                    let msg = Message::MServerCtrlReq { msg: ack };
                    if let Err(e) = framed.send(msg).await {
                        warn!(error = %e, "failed to send recovery ack, reconnecting");
                        break;
                    }
                }
            }
        }
    }
}

async fn connect(host: &str, port: u16) -> Framed<TcpStream, MessageCodec> {
    loop {
        match TcpStream::connect((host, port)).await {
            Ok(stream) => return Framed::new(stream, MessageCodec),
            Err(e) => {
                warn!(error = %e, "could not reach coordinator control port, retrying");
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }
}
