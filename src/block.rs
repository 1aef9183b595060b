use crate::{block_len, PieceIndex};

/// A block is a fixed size chunk of a piece, which in turn is a fixed size
/// chunk of a torrent. Block requests, transfers and cancellations all
/// happen at this granularity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockInfo {
    /// The index of the piece of which this is a block.
    pub piece_index: PieceIndex,
    /// The zero-based byte offset of the block within its piece.
    pub offset: u32,
    /// The block's length in bytes. Always 16 KiB except for possibly the
    /// last block of the last piece.
    pub len: u32,
}

impl BlockInfo {
    /// Builds the block info that would result from requesting the `index`th
    /// block of a piece of the given length.
    pub fn new(piece_index: PieceIndex, index: usize, piece_len: u32) -> Self {
        Self {
            piece_index,
            offset: index as u32 * crate::BLOCK_LEN,
            len: block_len(piece_len, index),
        }
    }

    /// Returns the index of this block within its piece, assuming the
    /// default block length of 16 KiB.
    pub fn index_in_piece(&self) -> usize {
        debug_assert!(self.len <= crate::BLOCK_LEN);
        debug_assert!(self.len > 0);
        (self.offset / crate::BLOCK_LEN) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_in_piece_matches_construction_index() {
        let piece_len = 3 * crate::BLOCK_LEN;
        for i in 0..3 {
            let block = BlockInfo::new(0, i, piece_len);
            assert_eq!(block.index_in_piece(), i);
        }
    }
}
