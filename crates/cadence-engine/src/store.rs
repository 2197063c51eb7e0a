//! Two-tier slot store.
//!
//! The slow tier is the full wheel (default 4096 slots); the fast tier is a
//! small window (default 192 slots) that alone serves the dequeue hot path.
//! The slow-tier bitmap is the authoritative occupancy record — the slot
//! allocator probes it and the dequeue path tests it. The fast-tier bitmap
//! only marks slots the enqueue path populated directly, so the synchronizer
//! never clobbers a near-term packet that arrived after its read was issued
//! ("enqueue wins").
//!
//! All methods run under the engine's state lock; nothing here awaits.

use cadence_core::desc::PacketDesc;

use crate::bitmap::OccupancyBitmap;
use crate::wheel::SlotGeometry;

/// Slots migrated per synchronizer run, and the drain threshold that arms it.
pub const SYNC_BATCH: usize = 8;

pub struct TierStore {
    geo: SlotGeometry,
    slow: Vec<PacketDesc>,
    fast: Vec<PacketDesc>,
    slow_bits: OccupancyBitmap,
    fast_bits: OccupancyBitmap,
    slow_head: usize,
    fast_head: usize,
    slow_sync_end: usize,
    fast_sync_end: usize,
    /// Fast slots freed by head advances and not yet reclaimed by sync.
    drained: usize,
    head_time: u64,
}

impl TierStore {
    /// `sync_lead` is how far ahead of the head the sync cursors start; the
    /// fast window beyond the lead is served by direct placement only.
    pub fn new(geo: SlotGeometry, sync_lead: usize, now: u64) -> Self {
        debug_assert!(sync_lead % SYNC_BATCH == 0 && sync_lead < geo.fast_capacity);
        Self {
            slow: vec![PacketDesc::default(); geo.slow_capacity],
            fast: vec![PacketDesc::default(); geo.fast_capacity],
            slow_bits: OccupancyBitmap::new(geo.slow_capacity),
            fast_bits: OccupancyBitmap::new(geo.fast_capacity),
            slow_head: 0,
            fast_head: 0,
            slow_sync_end: sync_lead,
            fast_sync_end: sync_lead,
            drained: 0,
            head_time: geo.align_down(now),
            geo,
        }
    }

    pub fn head_time(&self) -> u64 {
        self.head_time
    }

    pub fn slow_head(&self) -> usize {
        self.slow_head
    }

    pub fn fast_head(&self) -> usize {
        self.fast_head
    }

    pub fn scheduled(&self) -> usize {
        self.slow_bits.occupied()
    }

    /// Head-relative distance still served by direct fast-tier placement.
    pub fn fast_window(&self) -> usize {
        self.geo.fast_capacity.saturating_sub(self.drained)
    }

    pub fn find_free(&self, desired: usize, probe_words: usize) -> Option<usize> {
        self.slow_bits.find_free_at_or_after(desired, probe_words)
    }

    /// Record a slot as scheduled. Caller owns the slot from here until it
    /// is dequeued.
    pub fn mark_scheduled(&mut self, slot: usize) {
        debug_assert!(!self.slow_bits.test(slot), "double-booked slot {slot}");
        self.slow_bits.set(slot);
    }

    /// Write a near-term descriptor straight into the fast tier. Returns the
    /// fast index used. `delta_slots` must be inside `fast_window()`.
    pub fn place_fast(&mut self, delta_slots: usize, desc: PacketDesc) -> usize {
        debug_assert!(delta_slots < self.fast_window());
        let mut idx = self.fast_head + delta_slots;
        if idx >= self.geo.fast_capacity {
            idx -= self.geo.fast_capacity;
        }
        self.fast[idx] = desc;
        self.fast_bits.set(idx);
        idx
    }

    /// Write a far descriptor into the slow tier; the synchronizer carries
    /// it into the fast tier before the head reaches it.
    pub fn place_slow(&mut self, slot: usize, desc: PacketDesc) {
        self.slow[slot] = desc;
    }

    pub fn head_occupied(&self) -> bool {
        self.slow_bits.test(self.slow_head)
    }

    pub fn fast_slot_occupied(&self, idx: usize) -> bool {
        self.fast_bits.test(idx)
    }

    /// Pop the descriptor at the head and clear both tiers' occupancy bits.
    /// Only meaningful when `head_occupied()`.
    pub fn pop_head(&mut self) -> PacketDesc {
        let desc = self.fast[self.fast_head];
        self.slow_bits.clear(self.slow_head);
        self.fast_bits.clear(self.fast_head);
        desc
    }

    /// Advance the wheel by exactly one slot. Dequeue path only.
    pub fn advance_head(&mut self) {
        self.slow_head += 1;
        if self.slow_head == self.geo.slow_capacity {
            self.slow_head = 0;
        }
        self.fast_head += 1;
        if self.fast_head == self.geo.fast_capacity {
            self.fast_head = 0;
        }
        self.head_time += self.geo.slot_ticks();
        self.drained += 1;
    }

    pub fn sync_ready(&self) -> bool {
        self.drained >= SYNC_BATCH
    }

    /// Migrate the next batch of slow-tier slots into the freed fast-tier
    /// positions. Fast slots the enqueue path already populated are left
    /// alone. Returns the number of slots copied.
    pub fn sync_batch(&mut self) -> usize {
        if !self.sync_ready() {
            return 0;
        }

        let fast_start = self.fast_sync_end;
        let slow_start = self.slow_sync_end;

        // Reserve the batch before copying, as the cursors are what other
        // operations read.
        self.drained -= SYNC_BATCH;
        self.fast_sync_end += SYNC_BATCH;
        if self.fast_sync_end >= self.geo.fast_capacity {
            self.fast_sync_end -= self.geo.fast_capacity;
        }
        self.slow_sync_end += SYNC_BATCH;
        if self.slow_sync_end >= self.geo.slow_capacity {
            self.slow_sync_end -= self.geo.slow_capacity;
        }

        let mut copied = 0;
        for i in 0..SYNC_BATCH {
            let mut fast_idx = fast_start + i;
            if fast_idx >= self.geo.fast_capacity {
                fast_idx -= self.geo.fast_capacity;
            }
            let slow_idx = (slow_start + i) & (self.geo.slow_capacity - 1);
            if !self.fast_bits.test(fast_idx) {
                self.fast[fast_idx] = self.slow[slow_idx];
                copied += 1;
            }
        }
        copied
    }
}
