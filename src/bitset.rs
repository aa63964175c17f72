// bitset.rs - Port of the bitset_* helpers of regex_internal.h
// A fixed 256-bit set indexed by byte value.

use std::fmt;

const WORD_BITS: usize = 64;
const WORDS: usize = 256 / WORD_BITS;

/// Membership for each of the 256 byte values.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BitSet([u64; WORDS]);

impl BitSet {
    pub const EMPTY: BitSet = BitSet([0; WORDS]);
    pub const FULL: BitSet = BitSet([u64::MAX; WORDS]);

    pub fn new() -> Self {
        Self::EMPTY
    }

    /// Bytes `0x00..=0x7f`.
    pub fn ascii() -> Self {
        BitSet([u64::MAX, u64::MAX, 0, 0])
    }

    #[inline]
    pub fn set(&mut self, b: u8) {
        self.0[b as usize / WORD_BITS] |= 1 << (b as usize % WORD_BITS);
    }

    #[inline]
    pub fn clear(&mut self, b: u8) {
        self.0[b as usize / WORD_BITS] &= !(1 << (b as usize % WORD_BITS));
    }

    #[inline]
    pub fn contains(&self, b: u8) -> bool {
        self.0[b as usize / WORD_BITS] & (1 << (b as usize % WORD_BITS)) != 0
    }

    pub fn set_all(&mut self) {
        *self = Self::FULL;
    }

    pub fn clear_all(&mut self) {
        *self = Self::EMPTY;
    }

    pub fn set_range(&mut self, lo: u8, hi: u8) {
        for b in lo..=hi {
            self.set(b);
        }
    }

    /// Complement in place.
    pub fn invert(&mut self) {
        for w in &mut self.0 {
            *w = !*w;
        }
    }

    pub fn merge(&mut self, other: &BitSet) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a |= *b;
        }
    }

    /// Keep only members also in `mask`.
    pub fn mask(&mut self, mask: &BitSet) {
        for (a, b) in self.0.iter_mut().zip(mask.0.iter()) {
            *a &= *b;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&w| w == 0)
    }

    pub fn is_full(&self) -> bool {
        self.0.iter().all(|&w| w == u64::MAX)
    }

    pub fn count(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=255u8).filter(move |&b| self.contains(b))
    }
}

impl fmt::Debug for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        let mut b = 0usize;
        while b < 256 {
            if !self.contains(b as u8) {
                b += 1;
                continue;
            }
            let start = b;
            while b + 1 < 256 && self.contains((b + 1) as u8) {
                b += 1;
            }
            if start == b {
                set.entry(&format_args!("{:#04x}", start));
            } else {
                set.entry(&format_args!("{:#04x}-{:#04x}", start, b));
            }
            b += 1;
        }
        set.finish()
    }
}
