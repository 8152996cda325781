// src/core/protocol/codec.rs

//! Frames [`Message`] values as `<u32 length><bincode payload>` over a
//! `tokio_util::codec::Framed` stream, the same `Encoder`/`Decoder` split
//! `RespFrameCodec` uses for RESP frames, but with a length-prefixed
//! bincode payload standing in for a hand-rolled text grammar — spec.md
//! treats the wire bit-layout as a given ("assumed as typed
//! request/response values with known encoding").

use super::message::Message;
use crate::core::errors::KvError;
use crate::core::placement::MAX_MSG_LEN;
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Matches `placement::MAX_MSG_LEN`; a frame claiming to be larger is a
/// protocol error, not a partial read.
const MAX_FRAME_LEN: usize = MAX_MSG_LEN;
const LEN_PREFIX: usize = 4;

fn bincode_config() -> bincode::config::Configuration {
    bincode::config::standard()
}

pub fn encode_message(msg: &Message) -> Result<Vec<u8>, KvError> {
    bincode::encode_to_vec(msg, bincode_config())
        .map_err(|e| KvError::Protocol(format!("encode failure: {e}")))
}

pub fn decode_message(buf: &[u8]) -> Result<Message, KvError> {
    let (msg, _) = bincode::decode_from_slice(buf, bincode_config())
        .map_err(|e| KvError::Protocol(format!("decode failure: {e}")))?;
    Ok(msg)
}

/// A `tokio_util::codec` implementation for framing [`Message`] values.
#[derive(Debug, Default)]
pub struct MessageCodec;

impl Encoder<Message> for MessageCodec {
    type Error = KvError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = encode_message(&item)?;
        if payload.len() > MAX_FRAME_LEN {
            return Err(KvError::ValueTooLarge);
        }
        dst.reserve(LEN_PREFIX + payload.len());
        dst.put_u32(payload.len() as u32);
        dst.extend_from_slice(&payload);
        Ok(())
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = KvError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LEN_PREFIX {
            return Ok(None);
        }
        let len = u32::from_be_bytes(src[..LEN_PREFIX].try_into().unwrap()) as usize;
        if len > MAX_FRAME_LEN {
            return Err(KvError::Protocol(format!("frame of {len} bytes exceeds ceiling")));
        }
        if src.len() < LEN_PREFIX + len {
            src.reserve(LEN_PREFIX + len - src.len());
            return Ok(None);
        }
        src.advance(LEN_PREFIX);
        let payload = src.split_to(len);
        let msg = decode_message(&payload)?;
        Ok(Some(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::message::Op;

    #[test]
    fn codec_round_trips_across_two_writes() {
        let mut codec = MessageCodec;
        let msg = Message::OpReq {
            op: Op::Get {
                key: b"hello-world-0000".to_vec(),
            },
        };
        let mut buf = BytesMut::new();
        codec.encode(msg.clone(), &mut buf).unwrap();

        // Split the encoded frame to simulate a short read arriving in two
        // chunks; decode must return `None` until the whole frame lands.
        let tail = buf.split_off(buf.len() / 2);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.unsplit(tail);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, msg);
    }
}
