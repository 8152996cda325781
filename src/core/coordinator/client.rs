// src/core/coordinator/client.rs

//! A one-shot client for the coordinator's outbound control link: connect to
//! a server's coordinator port, send a single `ServerCtrlReq`, read the
//! matching `ServerCtrlResp`, and drop the connection. Spec.md §6 only
//! requires the heartbeat/ack direction (server → coordinator) to be
//! long-lived; commands in the other direction are infrequent enough
//! (one per recovery step) that a fresh connection per command is simpler
//! than maintaining a persistent pool, and is still a single round trip per
//! request exactly like the client↔server op path.

use crate::core::errors::CoordError;
use crate::core::protocol::{CoordCmd, Message, MessageCodec, Status};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;

const CTRL_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends `cmd` to the server listening at `host:port` and returns whether it
/// replied `CTRLREQ_SUCCESS`. Any connection failure, timeout, or explicit
/// `CTRLREQ_FAILURE` is reported back as `Ok(false)` rather than an error —
/// callers treat "the command did not land" uniformly regardless of cause
/// (spec.md §4.1: an `UPDATE_*_FAILED` and a dead connection both abort the
/// same way).
pub async fn send_ctrl_cmd(host: &str, port: u16, cmd: CoordCmd) -> Result<bool, CoordError> {
    let fut = async move {
        let stream = TcpStream::connect((host, port)).await.map_err(|_| ())?;
        let mut framed = Framed::new(stream, MessageCodec);
        framed
            .send(Message::ServerCtrlReq { cmd })
            .await
            .map_err(|_| ())?;
        match framed.next().await {
            Some(Ok(Message::ServerCtrlResp { status })) => Ok(status == Status::CtrlReqSuccess),
            _ => Ok(false),
        }
    };
    match timeout(CTRL_TIMEOUT, fut).await {
        Ok(Ok(ok)) => Ok(ok),
        Ok(Err(())) => Ok(false),
        Err(_) => Ok(false),
    }
}
