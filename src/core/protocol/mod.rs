// src/core/protocol/mod.rs

pub mod codec;
pub mod message;

pub use codec::MessageCodec;
pub use message::{CoordCmd, Message, Op, PeerOp, ServerCtrlMsg, Status, TableTarget};
