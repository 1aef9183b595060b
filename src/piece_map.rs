//! The torrent's piece map: piece index to length and expected hash.
//!
//! A trimmed descendant of `cratetorrent::storage_info::StorageInfo` that
//! keeps only what the Controller and the collaborator interfaces need.
//! File layout and on-disk paths belong to the out-of-scope File System
//! Process and are not represented here.

use crate::{error::Error, PieceIndex, Sha1Hash};

/// Piece geometry and hashes for a single torrent, handed to the Controller
/// as part of its immutable configuration (`PCF`).
#[derive(Clone, Debug)]
pub struct PieceMap {
    piece_count: usize,
    piece_len: u32,
    last_piece_len: u32,
    hashes: Vec<Sha1Hash>,
}

impl PieceMap {
    /// Builds a piece map from its constituent parts. Callers (tracker/
    /// metainfo parsing, out of scope here) are responsible for deriving
    /// these from a `.torrent` file.
    pub fn new(piece_len: u32, last_piece_len: u32, hashes: Vec<Sha1Hash>) -> Self {
        Self {
            piece_count: hashes.len(),
            piece_len,
            last_piece_len,
            hashes,
        }
    }

    pub fn piece_count(&self) -> usize {
        self.piece_count
    }

    /// Returns the length of the piece at `index`, accounting for the final
    /// piece possibly being shorter than the nominal piece length.
    pub fn piece_len(&self, index: PieceIndex) -> Result<u32, Error> {
        if index >= self.piece_count {
            Err(Error::InvalidPieceIndex(index))
        } else if index == self.piece_count - 1 {
            Ok(self.last_piece_len)
        } else {
            Ok(self.piece_len)
        }
    }

    pub fn piece_hash(&self, index: PieceIndex) -> Result<Sha1Hash, Error> {
        self.hashes
            .get(index)
            .copied()
            .ok_or(Error::InvalidPieceIndex(index))
    }

    pub fn contains(&self, index: PieceIndex) -> bool {
        index < self.piece_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> PieceMap {
        PieceMap::new(16, 8, vec![[0u8; 20]; 4])
    }

    #[test]
    fn last_piece_len_is_used_only_for_last_index() {
        let map = map();
        assert_eq!(map.piece_len(0).unwrap(), 16);
        assert_eq!(map.piece_len(2).unwrap(), 16);
        assert_eq!(map.piece_len(3).unwrap(), 8);
    }

    #[test]
    fn out_of_range_is_an_error() {
        let map = map();
        assert!(map.piece_len(4).is_err());
        assert!(!map.contains(4));
    }
}
