// needed by the `select!` macro reaching the default recursion limit
#![recursion_limit = "256"]

mod block;
pub mod conf;
pub mod control;
pub mod controller;
pub mod counter;
pub mod disk;
pub mod error;
pub mod piece_manager;
pub mod piece_map;
pub mod piece_set;
pub mod peer_manager;
pub mod receiver;
pub mod registers;
mod sender;
pub mod sender_queue;
mod session;
pub mod wire;

pub use block::BlockInfo;
pub use control::{PeerCommand, PeerCommandReceiver, PeerCommandSender};
pub use controller::{Controller, PeerConf, PeerState};
pub use counter::Rate;
pub use disk::{DiskHandle, DiskRequest};
pub use piece_manager::{GrabResult, PieceManagerHandle, PieceManagerRequest};
pub use piece_map::PieceMap;
pub use piece_set::PieceSet;
pub use peer_manager::{PeerManagerEvent, PeerManagerHandle};
pub use registers::{RateEntry, SharedRegister, StatusSample};
pub use session::{spawn, PeerSession};

/// The type of a piece's index.
///
/// On the wire all integers are sent as 4-byte big endian integers, but in the
/// source code we use `usize` to be consistent with other index types in
/// Rust.
pub type PieceIndex = usize;

/// Each torrent gets a randomly assigned ID that is unique within the
/// application.
pub type TorrentId = u32;

/// The peer ID is an arbitrary 20 byte string.
///
/// Guidelines for choosing a peer ID: http://bittorrent.org/beps/bep_0020.html.
pub type PeerId = [u8; 20];

/// A SHA-1 hash digest, 20 bytes long.
pub type Sha1Hash = [u8; 20];

/// This is the only block length we're dealing with (except for possibly the
/// last block). It is the widely used and accepted 16 KiB.
pub(crate) const BLOCK_LEN: u32 = 0x4000;

/// Returns the length of the block at the index in piece.
///
/// If the piece is not a multiple of the default block length, the returned
/// value is smaller.
///
/// # Panics
///
/// Panics if the index multiplied by the default block length would exceed
/// the piece length.
pub(crate) fn block_len(piece_len: u32, index: usize) -> u32 {
    let index = index as u32;
    let block_offset = index * BLOCK_LEN;
    assert!(piece_len > block_offset);
    std::cmp::min(piece_len - block_offset, BLOCK_LEN)
}

/// Returns the number of blocks in a piece of the given length.
pub(crate) fn block_count(piece_len: u32) -> usize {
    (piece_len as usize + (BLOCK_LEN as usize - 1)) / BLOCK_LEN as usize
}
