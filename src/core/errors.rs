// src/core/errors.rs

//! Error types shared by the coordinator and the KV server.

use std::sync::Arc;
use thiserror::Error;

/// Errors raised while handling a client or peer request on a KV server.
#[derive(Error, Debug, Clone)]
pub enum KvError {
    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("value exceeds the message size ceiling")]
    ValueTooLarge,

    #[error("key owner mismatch: this server does not serve that key")]
    SemanticError,

    #[error("out of space")]
    OutOfSpace,

    #[error("a recovery peer failed mid-stream: {0}")]
    RecoveryPeerFailed(String),
}

impl From<std::io::Error> for KvError {
    fn from(e: std::io::Error) -> Self {
        KvError::Io(Arc::new(e))
    }
}

/// Errors raised inside the coordinator's control-plane logic.
#[derive(Error, Debug, Clone)]
pub enum CoordError {
    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("unknown server id {0}")]
    UnknownServer(usize),

    #[error("no response from server {0} launching its replacement")]
    LaunchFailed(usize),

    #[error("recovery aborted for shard {0}: {1}")]
    RecoveryAborted(usize, String),
}

impl From<std::io::Error> for CoordError {
    fn from(e: std::io::Error) -> Self {
        CoordError::Io(Arc::new(e))
    }
}
