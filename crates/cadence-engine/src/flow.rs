//! Per-flow rate state — last recorded departure time per flow id.
//!
//! Mutated only by the enqueue path, one read-modify-write per admitted
//! packet. The flow id and rate code arrive embedded in the descriptor's
//! pacing field; classification happens upstream.

pub struct FlowTable {
    last_departure: Vec<u64>,
    gap_scale: u64,
}

impl FlowTable {
    pub fn new(flows: usize, gap_scale: u64) -> Self {
        assert!(flows.is_power_of_two());
        Self {
            last_departure: vec![0; flows],
            gap_scale,
        }
    }

    /// Inter-packet gap in ticks for a descriptor rate code.
    pub fn gap_ticks(&self, rate_code: u16) -> u64 {
        rate_code as u64 * self.gap_scale
    }

    /// Earliest legal departure for the flow's next packet: one gap after
    /// the previous departure, but never in the past.
    pub fn departure(&self, flow: u8, gap: u64, now: u64) -> u64 {
        let idx = flow as usize & (self.last_departure.len() - 1);
        (self.last_departure[idx] + gap).max(now)
    }

    pub fn record(&mut self, flow: u8, departure: u64) {
        let idx = flow as usize & (self.last_departure.len() - 1);
        self.last_departure[idx] = departure;
    }

    pub fn last(&self, flow: u8) -> u64 {
        self.last_departure[flow as usize & (self.last_departure.len() - 1)]
    }
}
