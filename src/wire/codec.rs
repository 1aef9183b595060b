use std::convert::{TryFrom, TryInto};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{
    block::BlockInfo,
    error::Error,
    piece_set::Bits,
    wire::{Message, MessageId},
};

/// The codec used once the handshake is complete, for all regular peer-wire
/// messages.
///
/// Frames are `<4-byte big-endian length><1-byte id><payload>`, with the
/// `KEEPALIVE` message being the special case of a zero length and no id
/// byte at all.
pub struct PeerCodec;

impl Encoder<Message> for PeerCodec {
    type Error = Error;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match msg {
            Message::KeepAlive => dst.put_u32(0),
            Message::Choke => {
                dst.put_u32(1);
                dst.put_u8(MessageId::Choke as u8);
            }
            Message::Unchoke => {
                dst.put_u32(1);
                dst.put_u8(MessageId::Unchoke as u8);
            }
            Message::Interested => {
                dst.put_u32(1);
                dst.put_u8(MessageId::Interested as u8);
            }
            Message::NotInterested => {
                dst.put_u32(1);
                dst.put_u8(MessageId::NotInterested as u8);
            }
            Message::Have(pn) => {
                dst.put_u32(5);
                dst.put_u8(MessageId::Have as u8);
                dst.put_u32(pn as u32);
            }
            Message::Bitfield(bits) => {
                let raw = bits.into_vec();
                dst.put_u32(1 + raw.len() as u32);
                dst.put_u8(MessageId::Bitfield as u8);
                dst.extend_from_slice(&raw);
            }
            Message::Request(b) => {
                dst.put_u32(13);
                dst.put_u8(MessageId::Request as u8);
                dst.put_u32(b.piece_index as u32);
                dst.put_u32(b.offset);
                dst.put_u32(b.len);
            }
            Message::Piece {
                piece_index,
                offset,
                data,
            } => {
                dst.put_u32(9 + data.len() as u32);
                dst.put_u8(MessageId::Piece as u8);
                dst.put_u32(piece_index as u32);
                dst.put_u32(offset);
                dst.extend_from_slice(&data);
            }
            Message::Cancel(b) => {
                dst.put_u32(13);
                dst.put_u8(MessageId::Cancel as u8);
                dst.put_u32(b.piece_index as u32);
                dst.put_u32(b.offset);
                dst.put_u32(b.len);
            }
            Message::Port(port) => {
                dst.put_u32(3);
                dst.put_u8(MessageId::Port as u8);
                dst.put_u16(port);
            }
        }
        Ok(())
    }
}

impl Decoder for PeerCodec {
    type Item = Message;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.remaining() < 4 {
            return Ok(None);
        }

        let len = u32::from_be_bytes(src[..4].try_into().unwrap()) as usize;
        if src.remaining() < 4 + len {
            src.reserve(4 + len - src.remaining());
            return Ok(None);
        }

        src.advance(4);
        if len == 0 {
            return Ok(Some(Message::KeepAlive));
        }

        let id_byte = src.get_u8();
        let id = MessageId::try_from(id_byte).map_err(|_| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown message id {}", id_byte),
            ))
        })?;

        let msg = match id {
            MessageId::Choke => Message::Choke,
            MessageId::Unchoke => Message::Unchoke,
            MessageId::Interested => Message::Interested,
            MessageId::NotInterested => Message::NotInterested,
            MessageId::Have => Message::Have(src.get_u32() as usize),
            MessageId::Bitfield => {
                let mut raw = vec![0u8; len - 1];
                src.copy_to_slice(&mut raw);
                Message::Bitfield(Bits::from_vec(raw))
            }
            MessageId::Request => Message::Request(BlockInfo {
                piece_index: src.get_u32() as usize,
                offset: src.get_u32(),
                len: src.get_u32(),
            }),
            MessageId::Piece => {
                let piece_index = src.get_u32() as usize;
                let offset = src.get_u32();
                let data = src.split_to(len - 9).freeze();
                Message::Piece {
                    piece_index,
                    offset,
                    data,
                }
            }
            MessageId::Cancel => Message::Cancel(BlockInfo {
                piece_index: src.get_u32() as usize,
                offset: src.get_u32(),
                len: src.get_u32(),
            }),
            MessageId::Port => Message::Port(src.get_u16()),
        };

        Ok(Some(msg))
    }
}

/// Encodes a [`PieceSet`](crate::piece_set::PieceSet)'s bits into the raw
/// bitfield bytes that go out over the wire.
pub fn encode_bitfield(bits: &Bits) -> Bytes {
    Bytes::copy_from_slice(bits.as_raw_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn round_trips_control_messages() {
        let msgs = [
            Message::KeepAlive,
            Message::Choke,
            Message::Unchoke,
            Message::Interested,
            Message::NotInterested,
            Message::Have(11),
            Message::Port(6881),
        ];
        let mut buf = BytesMut::new();
        for msg in &msgs {
            PeerCodec.encode(msg.clone(), &mut buf).unwrap();
        }
        for expected in &msgs {
            let decoded = PeerCodec.decode(&mut buf).unwrap().unwrap();
            assert_eq!(&decoded, expected);
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn round_trips_request_and_piece() {
        let mut buf = BytesMut::new();
        let req = Message::Request(BlockInfo {
            piece_index: 3,
            offset: 0x4000,
            len: 0x4000,
        });
        PeerCodec.encode(req.clone(), &mut buf).unwrap();
        assert_eq!(PeerCodec.decode(&mut buf).unwrap().unwrap(), req);

        let piece = Message::Piece {
            piece_index: 3,
            offset: 0,
            data: Bytes::from_static(&[1, 2, 3, 4]),
        };
        PeerCodec.encode(piece.clone(), &mut buf).unwrap();
        assert_eq!(PeerCodec.decode(&mut buf).unwrap().unwrap(), piece);
    }

    #[test]
    fn decode_waits_for_full_frame() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0, 0, 0]);
        assert_eq!(PeerCodec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(&[1, MessageId::Interested as u8]);
        assert_eq!(
            PeerCodec.decode(&mut buf).unwrap().unwrap(),
            Message::Interested
        );
    }

    #[test]
    fn bitfield_round_trips() {
        let mut bits = Bits::repeat(false, 8);
        bits.set(0, true);
        bits.set(7, true);
        let mut buf = BytesMut::new();
        PeerCodec
            .encode(Message::Bitfield(bits.clone()), &mut buf)
            .unwrap();
        match PeerCodec.decode(&mut buf).unwrap().unwrap() {
            Message::Bitfield(decoded) => assert_eq!(decoded, bits),
            other => panic!("expected bitfield, got {:?}", other),
        }
    }
}
