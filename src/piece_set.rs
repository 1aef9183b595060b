use bitvec::prelude::{BitVec, Msb0};

use crate::PieceIndex;

/// The bit order/storage used to represent piece availability, matching the
/// wire's MSB-first bitfield layout so decoding is a direct copy.
pub type Bits = BitVec<u8, Msb0>;

/// A dense, fixed-size set of piece indices, used to represent which pieces
/// of the torrent a peer holds (`peerPieces` in the design).
///
/// Backed by a bitset so that it scales to torrents with hundreds of
/// thousands of pieces. `len()` is O(1): we keep a running popcount rather
/// than recomputing it on every call, since the Controller checks it on
/// every tick (to determine `isSeeder`) and after every `HAVE`.
#[derive(Clone, Debug)]
pub struct PieceSet {
    bits: Bits,
    count: usize,
}

impl PieceSet {
    /// Creates an empty piece set with room for `piece_count` pieces.
    pub fn new(piece_count: usize) -> Self {
        Self {
            bits: Bits::repeat(false, piece_count),
            count: 0,
        }
    }

    /// The total number of pieces this set can represent.
    pub fn capacity(&self) -> usize {
        self.bits.len()
    }

    /// The number of pieces currently marked as held.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns true iff this set holds every piece of the torrent (i.e. the
    /// peer is a seeder).
    pub fn is_full(&self) -> bool {
        self.count == self.capacity()
    }

    pub fn contains(&self, index: PieceIndex) -> bool {
        self.bits.get(index).map(|b| *b).unwrap_or(false)
    }

    /// Marks `index` as held. Returns `true` if this was a new insertion.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range; callers must validate indices
    /// against the torrent's piece count first (a HAVE/BITFIELD referring to
    /// an out-of-range piece is a protocol violation, not something this
    /// type silently tolerates).
    pub fn insert(&mut self, index: PieceIndex) -> bool {
        let mut slot = self
            .bits
            .get_mut(index)
            .expect("piece index out of range");
        if *slot {
            false
        } else {
            *slot = true;
            self.count += 1;
            true
        }
    }

    /// Replaces the whole set from a decoded bitfield, recomputing the
    /// popcount once.
    pub fn set_from_bitfield(&mut self, bits: Bits) {
        debug_assert_eq!(bits.len(), self.bits.len());
        self.count = bits.count_ones();
        self.bits = bits;
    }

    /// Iterates the indices currently marked as held.
    pub fn iter(&self) -> impl Iterator<Item = PieceIndex> + '_ {
        self.bits.iter().enumerate().filter_map(|(i, b)| if *b { Some(i) } else { None })
    }
}
