//! The peer-wire protocol: message types, framing and (de)serialization.
//!
//! Listed as an out-of-scope collaborator in the design (its *contents*
//! aren't the interesting part of this crate), but the Receiver, Sender and
//! Sender Queue all depend on its `Message` type and `PeerCodec`, so it's
//! implemented here as the leaf of the dependency chain.

pub mod codec;
pub mod handshake;

use bytes::Bytes;

use crate::{block::BlockInfo, piece_set::Bits, PieceIndex};

/// All peer-wire message types the Controller accepts and emits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    Have(PieceIndex),
    Bitfield(Bits),
    Request(BlockInfo),
    Piece {
        piece_index: PieceIndex,
        offset: u32,
        data: Bytes,
    },
    Cancel(BlockInfo),
    Port(u16),
}

impl Message {
    /// The message id as sent on the wire, or `None` for `KEEPALIVE` which
    /// has no id byte.
    pub fn id(&self) -> Option<MessageId> {
        Some(match self {
            Self::KeepAlive => return None,
            Self::Choke => MessageId::Choke,
            Self::Unchoke => MessageId::Unchoke,
            Self::Interested => MessageId::Interested,
            Self::NotInterested => MessageId::NotInterested,
            Self::Have(_) => MessageId::Have,
            Self::Bitfield(_) => MessageId::Bitfield,
            Self::Request(_) => MessageId::Request,
            Self::Piece { .. } => MessageId::Piece,
            Self::Cancel(_) => MessageId::Cancel,
            Self::Port(_) => MessageId::Port,
        })
    }

    /// Returns true iff this is a `Message::Piece` carrying block data,
    /// i.e. the only message kind the Sender Queue rate-limits.
    pub fn is_block_data(&self) -> bool {
        matches!(self, Self::Piece { .. })
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeepAlive => write!(f, "keepalive"),
            Self::Choke => write!(f, "choke"),
            Self::Unchoke => write!(f, "unchoke"),
            Self::Interested => write!(f, "interested"),
            Self::NotInterested => write!(f, "not interested"),
            Self::Have(pn) => write!(f, "have({})", pn),
            Self::Bitfield(bits) => {
                write!(f, "bitfield({} pieces set)", bits.count_ones())
            }
            Self::Request(b) => write!(
                f,
                "request(piece={}, offset={}, len={})",
                b.piece_index, b.offset, b.len
            ),
            Self::Piece {
                piece_index,
                offset,
                data,
            } => write!(
                f,
                "piece(piece={}, offset={}, len={})",
                piece_index,
                offset,
                data.len()
            ),
            Self::Cancel(b) => write!(
                f,
                "cancel(piece={}, offset={}, len={})",
                b.piece_index, b.offset, b.len
            ),
            Self::Port(p) => write!(f, "port({})", p),
        }
    }
}

/// The one-byte message ids defined by BEP 3.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageId {
    Choke = 0,
    Unchoke = 1,
    Interested = 2,
    NotInterested = 3,
    Have = 4,
    Bitfield = 5,
    Request = 6,
    Piece = 7,
    Cancel = 8,
    Port = 9,
}

impl std::convert::TryFrom<u8> for MessageId {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Choke,
            1 => Self::Unchoke,
            2 => Self::Interested,
            3 => Self::NotInterested,
            4 => Self::Have,
            5 => Self::Bitfield,
            6 => Self::Request,
            7 => Self::Piece,
            8 => Self::Cancel,
            9 => Self::Port,
            other => return Err(other),
        })
    }
}
