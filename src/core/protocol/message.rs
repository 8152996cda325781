// src/core/protocol/message.rs

//! The typed wire message set described in spec.md §6. Every connection
//! kind (client↔coordinator, client↔server, server↔server, coordinator↔server)
//! exchanges values of the single [`Message`] enum; each handler only accepts
//! the subset of variants that are legal on its connection and treats the
//! rest as a protocol error, mirroring how `RespFrame` is one enum shared by
//! every connection kind in the teacher and dispatch narrows by discriminator.

/// A single client/server key-value operation.
#[derive(bincode::Encode, bincode::Decode, Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Noop,
    Get { key: Vec<u8> },
    Put { key: Vec<u8>, value: Vec<u8> },
}

/// Reply status codes, as enumerated in spec.md §6.
#[derive(bincode::Encode, bincode::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    KeyNotFound,
    OutOfSpace,
    ServerFailure,
    CtrlReqSuccess,
    CtrlReqFailure,
}

/// Which of a server's two tables a peer-originated PUT belongs in. Client
/// connections never set this explicitly — the receiving server infers the
/// target from its own admission rules (spec.md §4.2) — but a server↔server
/// connection always carries it, since the same peer link forwards ordinary
/// replication PUTs and recovery-stream PUTs, and those land in different
/// tables on the receiving end.
#[derive(bincode::Encode, bincode::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableTarget {
    Primary,
    Secondary,
}

/// A server↔server operation: synchronous replication of a forwarded PUT,
/// or a key streamed during recovery. `Noop` is the end-of-stream sentinel
/// spec.md §4.2 uses to mark the end of a recovery stream.
#[derive(bincode::Encode, bincode::Decode, Debug, Clone, PartialEq, Eq)]
pub enum PeerOp {
    Noop,
    Put {
        key: Vec<u8>,
        value: Vec<u8>,
        target: TableTarget,
    },
}

/// Control commands the coordinator emits to a server (spec.md §4.1).
#[derive(bincode::Encode, bincode::Decode, Debug, Clone, PartialEq, Eq)]
pub enum CoordCmd {
    SetSecondary { host: String, port: u16 },
    UpdatePrimary { host: String, port: u16 },
    UpdateSecondary { host: String, port: u16 },
    SwitchPrimary,
    Shutdown,
}

/// Control messages a server sends back to the coordinator (spec.md §4.1).
#[derive(bincode::Encode, bincode::Decode, Debug, Clone, PartialEq, Eq)]
pub enum ServerCtrlMsg {
    Heartbeat { sid: usize },
    UpdatedPrimary { sid: usize },
    UpdatePrimaryFailed { sid: usize },
    UpdatedSecondary { sid: usize },
    UpdateSecondaryFailed { sid: usize },
}

/// The full wire message set. One enum shared by every connection kind;
/// each listener only expects a subset and treats anything else as a
/// protocol error (spec.md §7).
#[derive(bincode::Encode, bincode::Decode, Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// client → coordinator
    LocateReq { key: Vec<u8> },
    /// coordinator → client
    LocateResp { host: String, client_port: u16 },

    /// client ↔ server
    OpReq { op: Op },
    OpResp { status: Status, value: Option<Vec<u8>> },

    /// server ↔ server: forwarded replication PUTs and recovery streams
    PeerOpReq { op: PeerOp },
    PeerOpResp { status: Status },

    /// coordinator → server
    ServerCtrlReq { cmd: CoordCmd },
    /// server → coordinator, reply to a `ServerCtrlReq`
    ServerCtrlResp { status: Status },

    /// server → coordinator, out of band (heartbeats, recovery acks)
    MServerCtrlReq { msg: ServerCtrlMsg },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::codec::{decode_message, encode_message};

    #[test]
    fn round_trips_every_variant() {
        let samples = vec![
            Message::LocateReq {
                key: b"k".to_vec(),
            },
            Message::LocateResp {
                host: "localhost".into(),
                client_port: 9001,
            },
            Message::OpReq {
                op: Op::Put {
                    key: b"k".to_vec(),
                    value: b"v".to_vec(),
                },
            },
            Message::OpResp {
                status: Status::Success,
                value: Some(b"v".to_vec()),
            },
            Message::PeerOpReq {
                op: PeerOp::Put {
                    key: b"k".to_vec(),
                    value: b"v".to_vec(),
                    target: TableTarget::Secondary,
                },
            },
            Message::PeerOpResp {
                status: Status::Success,
            },
            Message::ServerCtrlReq {
                cmd: CoordCmd::SwitchPrimary,
            },
            Message::ServerCtrlResp {
                status: Status::CtrlReqSuccess,
            },
            Message::MServerCtrlReq {
                msg: ServerCtrlMsg::Heartbeat { sid: 2 },
            },
        ];
        for msg in samples {
            let buf = encode_message(&msg).unwrap();
            let decoded = decode_message(&buf).unwrap();
            assert_eq!(msg, decoded);
        }
    }
}
