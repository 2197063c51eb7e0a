//! Slot geometry — pure departure-time ↔ slot-index arithmetic.
//!
//! ```text
//!            head_time (ticks)
//!                |
//!                |  slow_head (index)
//!                |       |
//!    0           |       |        slow_capacity - 1
//!    |           |       |              |
//!  +---+---+-----+--------------+-----+---+
//!  | 0 | 1 | ... |      n       | ... | m |
//!  +---+---+-----+--------------+-----+---+
//!                |______________|
//!                       |
//!                  1 << slot_shift ticks per slot
//! ```
//!
//! A departure time maps to `slow_head + ((departure - head_time) >> shift)`
//! modulo the ring, clamped to the horizon. No side effects; the wheel head
//! itself lives in the tier store and is advanced only by the dequeue path.

#[derive(Debug, Clone, Copy)]
pub struct SlotGeometry {
    pub slot_shift: u32,
    pub slow_capacity: usize,
    pub fast_capacity: usize,
    pub horizon_slots: u64,
}

impl SlotGeometry {
    pub fn slot_ticks(&self) -> u64 {
        1u64 << self.slot_shift
    }

    pub fn horizon_ticks(&self) -> u64 {
        self.horizon_slots << self.slot_shift
    }

    /// Whole slots between `head_time` and `departure`, saturating at zero
    /// ("send as soon as possible") and clamped to the horizon.
    pub fn delta_slots(&self, departure: u64, head_time: u64) -> u64 {
        (departure.saturating_sub(head_time) >> self.slot_shift).min(self.horizon_slots)
    }

    /// Slow-tier slot index for a head-relative distance.
    pub fn slot_at(&self, slow_head: usize, delta_slots: u64) -> usize {
        (slow_head + delta_slots as usize) & (self.slow_capacity - 1)
    }

    /// Ring distance from `from` to `to`, in slots.
    pub fn ring_diff(&self, to: usize, from: usize) -> usize {
        to.wrapping_sub(from) & (self.slow_capacity - 1)
    }

    /// Departure time with the horizon excess folded back, so the recorded
    /// flow departure never drifts past the wheel's reach.
    pub fn fold_to_horizon(&self, departure: u64, head_time: u64) -> u64 {
        departure.min(head_time + self.horizon_ticks())
    }

    /// Align a tick count down to a slot boundary.
    pub fn align_down(&self, ticks: u64) -> u64 {
        ticks & !(self.slot_ticks() - 1)
    }
}
