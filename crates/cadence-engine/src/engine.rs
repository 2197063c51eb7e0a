//! The pacing engine proper — admission, the wheel pump, and the tier
//! synchronizer, glued over the two-tier store.
//!
//! Locking discipline: `state` is a plain mutex and is never held across an
//! await. `pump` is an async mutex serializing the dequeue side (output
//! buffers and ack batching). When both are needed, `pump` is taken first;
//! the enqueue path instead releases `state` before touching `pump`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use cadence_core::clock::TickClock;
use cadence_core::config::EngineConfig;
use cadence_core::desc::{PacketDesc, SEG_LAST, SEG_NONE, BATCH_SIZE};

use crate::error::EngineError;
use crate::flow::FlowTable;
use crate::outbuf::{AckBatcher, AckUpdate, Forward, OutputBufferSet};
use crate::store::TierStore;
use crate::upstream::{seq_behind, SegmentRing, SeqCounters, UpstreamRing};
use crate::wheel::SlotGeometry;

/// Wheel state touched by both the enqueue and dequeue paths.
struct PaceState {
    store: TierStore,
    flows: FlowTable,
    /// Per-destination sequence counters, indexed by `dst_q & (len - 1)`.
    seqrs: Vec<u16>,
}

/// Dequeue-side collaborators. Guarded by one async mutex so forwards and
/// their acknowledgements stay in issue order.
struct PumpPath {
    bufs: OutputBufferSet,
    acks: AckBatcher,
}

#[derive(Default)]
struct Counters {
    admitted: AtomicU64,
    forwarded: AtomicU64,
    unpaced: AtomicU64,
    bursts: AtomicU64,
    synced: AtomicU64,
}

/// Point-in-time engine counters, serialized into the stats log line.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub admitted: u64,
    pub forwarded: u64,
    pub unpaced: u64,
    pub bursts: u64,
    pub synced: u64,
    pub scheduled: usize,
    pub head_time: u64,
}

pub struct PaceEngine {
    geo: SlotGeometry,
    probe_words: usize,
    sequencers: usize,
    debug_checks: bool,
    clock: Arc<dyn TickClock>,
    state: Mutex<PaceState>,
    pump: tokio::sync::Mutex<PumpPath>,
    upstream: tokio::sync::Mutex<UpstreamRing>,
    upstream_counters: Arc<SeqCounters>,
    segments: tokio::sync::Mutex<SegmentRing>,
    stats: Counters,
}

impl PaceEngine {
    pub fn new(
        cfg: &EngineConfig,
        clock: Arc<dyn TickClock>,
        upstream: UpstreamRing,
        segments: SegmentRing,
        forward_tx: mpsc::Sender<Forward>,
        ack_tx: mpsc::Sender<AckUpdate>,
    ) -> Arc<Self> {
        debug_assert!(cfg.validate().is_ok());
        let geo = SlotGeometry {
            slot_shift: cfg.slot_shift,
            slow_capacity: cfg.slow_capacity,
            fast_capacity: cfg.fast_capacity,
            horizon_slots: cfg.horizon_slots,
        };
        let now = clock.now();
        Arc::new(Self {
            geo,
            probe_words: cfg.probe_words,
            sequencers: cfg.sequencers,
            debug_checks: cfg.debug_checks,
            clock,
            state: Mutex::new(PaceState {
                store: TierStore::new(geo, cfg.sync_lead, now),
                flows: FlowTable::new(cfg.flows, cfg.rate_gap_scale),
                seqrs: vec![0; cfg.sequencers],
            }),
            pump: tokio::sync::Mutex::new(PumpPath {
                bufs: OutputBufferSet::new(forward_tx),
                acks: AckBatcher::new(ack_tx),
            }),
            upstream_counters: upstream.counters(),
            upstream: tokio::sync::Mutex::new(upstream),
            segments: tokio::sync::Mutex::new(segments),
            stats: Counters::default(),
        })
    }

    // ── Fetch ────────────────────────────────────────────────────────────────

    /// Claim the next upstream batch, or `None` when the ring is empty.
    /// Once any descriptor has been delivered the batch is committed: the
    /// remaining reads wait for the producer to finish it.
    pub async fn fetch_batch(&self) -> Result<Option<[PacketDesc; BATCH_SIZE]>, EngineError> {
        let mut up = self.upstream.lock().await;
        if up.available() == 0 {
            return Ok(None);
        }
        let mut batch = [PacketDesc::default(); BATCH_SIZE];
        for slot in batch.iter_mut() {
            *slot = up.recv().await?;
        }
        up.mark_served(BATCH_SIZE as u64);
        Ok(Some(batch))
    }

    /// Park until the upstream ring has something to fetch.
    pub async fn wait_upstream(&self) -> Result<(), EngineError> {
        self.upstream.lock().await.wait_nonempty().await
    }

    // ── Admission ────────────────────────────────────────────────────────────

    pub async fn admit_batch(&self, batch: [PacketDesc; BATCH_SIZE]) -> Result<(), EngineError> {
        for desc in batch {
            if desc.eop() && desc.seg == SEG_NONE {
                self.admit_one(desc).await?;
            } else if !desc.eop() && desc.seg != SEG_NONE {
                self.admit_segmented(desc).await?;
            } else {
                // Bookkeeping descriptor (reset markers and the like):
                // bypasses pacing, forwarded in arrival order.
                self.forward_unpaced(desc).await?;
            }
        }
        Ok(())
    }

    async fn admit_one(&self, desc: PacketDesc) -> Result<(), EngineError> {
        let now = self.clock.now();
        let departure = {
            let mut st = self.state.lock().unwrap();
            let gap = st.flows.gap_ticks(desc.rate_code());
            let departure = st.flows.departure(desc.flow_id(), gap, now);
            let folded = self.geo.fold_to_horizon(departure, st.store.head_time());
            st.flows.record(desc.flow_id(), folded);
            departure
        };
        self.schedule_at(departure, desc).await
    }

    /// Admit a segmented burst announced on the main ring. Segments arrive on
    /// the side ring; each one is held until the burst completion counter
    /// catches up with the sequence its transfer was issued under. Segments
    /// that complete a packet are paced one gap apart.
    async fn admit_segmented(&self, announce: PacketDesc) -> Result<(), EngineError> {
        let flow = announce.flow_id();
        let now = self.clock.now();
        let (gap, mut departure) = {
            let st = self.state.lock().unwrap();
            let gap = st.flows.gap_ticks(announce.rate_code());
            (gap, st.flows.departure(flow, gap, now))
        };

        let mut segments = 0u32;
        let mut scheduled = 0u32;
        let mut segs = self.segments.lock().await;
        loop {
            let seg = segs.next().await?;
            while seq_behind(seg.burst_seq, segs.completed()) {
                // A full unserviced batch queued behind this burst means the
                // producer already moved past it; the segment's transfer is
                // complete even if the counter write has not landed yet.
                if self.upstream_counters.available() > BATCH_SIZE as u64 {
                    break;
                }
                tokio::task::yield_now().await;
            }
            segments += 1;
            let desc = seg.desc;
            if desc.eop() {
                self.schedule_at(departure, desc).await?;
                departure += gap;
                scheduled += 1;
            }
            if desc.seg == SEG_LAST {
                break;
            }
        }
        drop(segs);

        if scheduled > 0 {
            let mut st = self.state.lock().unwrap();
            let last = departure - gap;
            let folded = self.geo.fold_to_horizon(last, st.store.head_time());
            st.flows.record(flow, folded);
        }
        self.stats.bursts.fetch_add(1, Ordering::Relaxed);
        debug!(flow, segments, scheduled, "segmented burst admitted");
        Ok(())
    }

    /// Allocate a slot at or after the departure time and store the
    /// descriptor in the matching tier.
    async fn schedule_at(&self, departure: u64, desc: PacketDesc) -> Result<(), EngineError> {
        if self.debug_checks {
            if desc.buf_handle() == 0 {
                return Err(EngineError::InvalidDescriptor {
                    reason: "zero payload handle",
                });
            }
            if desc.reserved != 0 {
                return Err(EngineError::InvalidDescriptor {
                    reason: "reserved bytes set",
                });
            }
        }

        let (slot_delta, far) = {
            let mut st = self.state.lock().unwrap();
            let delta = self.geo.delta_slots(departure, st.store.head_time());
            let desired = self.geo.slot_at(st.store.slow_head(), delta);
            let found = st.store.find_free(desired, self.probe_words).ok_or(
                EngineError::CapacityExceeded {
                    desired,
                    probe_slots: self.probe_words * 64,
                },
            )?;
            st.store.mark_scheduled(found);

            let slot_delta = delta as usize + self.geo.ring_diff(found, desired);
            let mut stored = desc;
            stored.clear_pacing();
            if slot_delta < st.store.fast_window() {
                st.store.place_fast(slot_delta, stored);
                (slot_delta, false)
            } else {
                st.store.place_slow(found, stored);
                (slot_delta, true)
            }
        };

        if far {
            // Far writes take one turn through the output-buffer rotation so
            // enqueue pressure and dequeue drain stay coupled.
            self.pump.lock().await.bufs.stage().await?;
        }
        self.stats.admitted.fetch_add(1, Ordering::Relaxed);
        trace!(slot_delta, far, "descriptor scheduled");
        Ok(())
    }

    /// Forward a bookkeeping descriptor straight to the work list, stamping
    /// its sequence number on the way out.
    async fn forward_unpaced(&self, mut desc: PacketDesc) -> Result<(), EngineError> {
        let mut pump = self.pump.lock().await;
        {
            let mut st = self.state.lock().unwrap();
            let idx = desc.dst_q as usize & (self.sequencers - 1);
            desc.seq = st.seqrs[idx];
            st.seqrs[idx] = st.seqrs[idx].wrapping_add(1);
        }
        let dst = desc.dst_q;
        pump.bufs.wait_free().await?;
        pump.bufs.forward(desc).await?;
        pump.acks.on_dequeue(dst).await?;
        self.stats.unpaced.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    // ── Dequeue ──────────────────────────────────────────────────────────────

    /// Drain every elapsed head slot, forwarding at most one batch of
    /// occupied ones. Returns the number forwarded; zero means the head slot
    /// has not elapsed yet.
    pub async fn pump_once(&self) -> Result<usize, EngineError> {
        enum Step {
            Pending,
            Advanced,
            Ready,
        }

        let mut pump = self.pump.lock().await;
        let mut forwarded = 0;
        while forwarded < BATCH_SIZE {
            let now = self.clock.now();
            let step = {
                let mut st = self.state.lock().unwrap();
                if now < st.store.head_time() + self.geo.slot_ticks() {
                    Step::Pending
                } else if st.store.head_occupied() {
                    Step::Ready
                } else {
                    st.store.advance_head();
                    self.sync_locked(&mut st);
                    Step::Advanced
                }
            };
            match step {
                Step::Pending => break,
                Step::Advanced => continue,
                Step::Ready => {
                    pump.bufs.wait_free().await?;
                    let desc = {
                        let mut st = self.state.lock().unwrap();
                        let mut desc = st.store.pop_head();
                        let idx = desc.dst_q as usize & (self.sequencers - 1);
                        desc.seq = st.seqrs[idx];
                        st.seqrs[idx] = st.seqrs[idx].wrapping_add(1);
                        st.store.advance_head();
                        self.sync_locked(&mut st);
                        desc
                    };
                    let dst = desc.dst_q;
                    pump.bufs.forward(desc).await?;
                    pump.acks.on_dequeue(dst).await?;
                    self.stats.forwarded.fetch_add(1, Ordering::Relaxed);
                    forwarded += 1;
                }
            }
        }
        Ok(forwarded)
    }

    /// Run the tier synchronizer to completion. The pump already syncs as it
    /// drains; this is the explicit entry point for the pump lane's idle
    /// cycle and for tests.
    pub fn sync(&self) -> usize {
        let mut st = self.state.lock().unwrap();
        self.sync_locked(&mut st)
    }

    fn sync_locked(&self, st: &mut PaceState) -> usize {
        let mut copied = 0;
        while st.store.sync_ready() {
            copied += st.store.sync_batch();
        }
        if copied > 0 {
            self.stats.synced.fetch_add(copied as u64, Ordering::Relaxed);
        }
        copied
    }

    /// Time until the head slot next elapses, for idle pump lanes.
    pub fn idle_delay(&self) -> Duration {
        let now = self.clock.now();
        let next = {
            let st = self.state.lock().unwrap();
            st.store.head_time() + self.geo.slot_ticks()
        };
        Duration::from_nanos(next.saturating_sub(now) * self.clock.tick_ns())
    }

    // ── Inspection ───────────────────────────────────────────────────────────

    pub fn head_time(&self) -> u64 {
        self.state.lock().unwrap().store.head_time()
    }

    pub fn flow_last(&self, flow: u8) -> u64 {
        self.state.lock().unwrap().flows.last(flow)
    }

    /// Currently scheduled (admitted, not yet forwarded) descriptors.
    pub fn scheduled(&self) -> usize {
        self.state.lock().unwrap().store.scheduled()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let (scheduled, head_time) = {
            let st = self.state.lock().unwrap();
            (st.store.scheduled(), st.store.head_time())
        };
        StatsSnapshot {
            admitted: self.stats.admitted.load(Ordering::Relaxed),
            forwarded: self.stats.forwarded.load(Ordering::Relaxed),
            unpaced: self.stats.unpaced.load(Ordering::Relaxed),
            bursts: self.stats.bursts.load(Ordering::Relaxed),
            synced: self.stats.synced.load(Ordering::Relaxed),
            scheduled,
            head_time,
        }
    }
}
