//! Occupancy bitmap — one bit per wheel slot, grouped into u64 words.
//!
//! Each tier owns an instance. A set bit means the slot holds a descriptor
//! awaiting dequeue. The free-slot scan is read-only; the caller sets the
//! bit after a successful probe, which is race-free because admission is
//! single-writer by the lane rotation.

const WORD_SHIFT: usize = 6;
const WORD_BITS: usize = 64;
const BIT_MASK: usize = WORD_BITS - 1;

pub struct OccupancyBitmap {
    words: Vec<u64>,
    len: usize,
}

impl OccupancyBitmap {
    /// `len` must be a multiple of 64 so the scan never has tail bits to
    /// special-case.
    pub fn new(len: usize) -> Self {
        assert!(len > 0 && len % WORD_BITS == 0);
        Self {
            words: vec![0; len >> WORD_SHIFT],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn set(&mut self, slot: usize) {
        debug_assert!(slot < self.len);
        self.words[slot >> WORD_SHIFT] |= 1u64 << (slot & BIT_MASK);
    }

    pub fn clear(&mut self, slot: usize) {
        debug_assert!(slot < self.len);
        self.words[slot >> WORD_SHIFT] &= !(1u64 << (slot & BIT_MASK));
    }

    pub fn test(&self, slot: usize) -> bool {
        debug_assert!(slot < self.len);
        (self.words[slot >> WORD_SHIFT] >> (slot & BIT_MASK)) & 1 != 0
    }

    pub fn occupied(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Nearest free slot at or after `start`, scanning at most `probe_words`
    /// words and wrapping at the bitmap end. The first word is masked below
    /// `start`'s bit position; later words are scanned whole.
    pub fn find_free_at_or_after(&self, start: usize, probe_words: usize) -> Option<usize> {
        debug_assert!(start < self.len);
        let word_count = self.words.len();
        let mut word_idx = start >> WORD_SHIFT;
        let mut free = !self.words[word_idx] & (!0u64 << (start & BIT_MASK));

        for _ in 0..probe_words {
            if free != 0 {
                return Some((word_idx << WORD_SHIFT) + free.trailing_zeros() as usize);
            }
            word_idx += 1;
            if word_idx == word_count {
                word_idx = 0;
            }
            free = !self.words[word_idx];
        }
        None
    }
}
