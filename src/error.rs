//! Error types for the peer engine.
//!
//! Mirrors the style of `cratetorrent`'s own `error` module: a single enum
//! with a hand written `Display`/`std::error::Error` impl and `From`
//! conversions, rather than a derive-macro crate.

use std::fmt;

use crate::PieceIndex;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can terminate a peer session.
///
/// Per the design, everything in here is fatal: on any of these, the
/// Controller runs its cleanup path and exits. Recoverable conditions (a
/// stray `PIECE`, a `REQUEST` received while choking) are absorbed in the
/// relevant handler and never become an `Error`.
#[derive(Debug)]
pub enum Error {
    /// The socket produced an I/O error, or the wire codec couldn't frame a
    /// message.
    Io(std::io::Error),
    /// Peer announced a `HAVE` or `BITFIELD` piece index outside of the
    /// torrent's piece count.
    InvalidPieceIndex(PieceIndex),
    /// Peer sent a `BITFIELD` after we had already recorded its piece
    /// availability (either from a previous bitfield or from `HAVE`s).
    BitfieldAlreadyPopulated,
    /// Peer sent a `BITFIELD` whose byte length doesn't match
    /// `ceil(piece_count / 8)`.
    MalformedBitfieldLength { expected: usize, actual: usize },
    /// A channel to one of the out-of-scope collaborators (piece manager,
    /// file system, peer manager) closed while we were waiting on a reply.
    /// Treated as a system-level failure, per the design.
    ChannelClosed(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {}", e),
            Self::InvalidPieceIndex(pn) => {
                write!(f, "piece index {} out of range", pn)
            }
            Self::BitfieldAlreadyPopulated => {
                write!(f, "bitfield received after piece availability already populated")
            }
            Self::MalformedBitfieldLength { expected, actual } => write!(
                f,
                "malformed bitfield: expected {} bytes, got {}",
                expected, actual
            ),
            Self::ChannelClosed(who) => {
                write!(f, "channel to {} closed unexpectedly", who)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
