//! Tick clock abstraction.
//!
//! The wheel is indexed in ticks, not wall time. Tick resolution is fixed at
//! engine construction; the default 20 ns tick matches a slot granularity of
//! 32 ticks = 640 ns per slot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A monotonically increasing tick counter.
pub trait TickClock: Send + Sync + 'static {
    /// Current time in ticks since an arbitrary epoch.
    fn now(&self) -> u64;

    /// Duration of one tick in nanoseconds.
    fn tick_ns(&self) -> u64;
}

/// Wall-clock-backed tick source.
pub struct MonotonicClock {
    epoch: Instant,
    tick_ns: u64,
}

impl MonotonicClock {
    pub fn new(tick_ns: u64) -> Self {
        assert!(tick_ns > 0, "tick resolution must be non-zero");
        Self {
            epoch: Instant::now(),
            tick_ns,
        }
    }
}

impl TickClock for MonotonicClock {
    fn now(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64 / self.tick_ns
    }

    fn tick_ns(&self) -> u64 {
        self.tick_ns
    }
}

/// Hand-advanced clock for tests. Time moves only when told to.
#[derive(Default)]
pub struct ManualClock {
    ticks: AtomicU64,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            ticks: AtomicU64::new(start),
        }
    }

    pub fn advance(&self, ticks: u64) {
        self.ticks.fetch_add(ticks, Ordering::SeqCst);
    }

    pub fn set(&self, ticks: u64) {
        self.ticks.store(ticks, Ordering::SeqCst);
    }
}

impl TickClock for ManualClock {
    fn now(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    fn tick_ns(&self) -> u64 {
        1
    }
}
