//! Cadence integration test harness.
//!
//! Tests here assemble a full engine — rings, channels, and a manual clock —
//! through the public API only, and drive it the way the daemon's lanes do.
//! The manual clock makes every release deterministic: time moves only when
//! a test advances it.

use std::sync::Arc;

use tokio::sync::mpsc;

use cadence_core::clock::ManualClock;
use cadence_core::config::EngineConfig;
use cadence_core::desc::{PacketDesc, SegmentDesc, FLAG_EOP};
use cadence_engine::{
    completion_ring, segment_ring, AckUpdate, BurstCounter, EngineError, Forward, PaceEngine,
    UpstreamHandle,
};

mod acks;
mod bursts;
mod capacity;
mod ordering;
mod pacing;
mod stats;
mod tiering;

// ── Harness ───────────────────────────────────────────────────────────────────

pub struct Rig {
    pub engine: Arc<PaceEngine>,
    pub clock: Arc<ManualClock>,
    pub upstream: UpstreamHandle,
    pub seg_tx: mpsc::Sender<SegmentDesc>,
    pub bursts: Arc<BurstCounter>,
    pub fwd_rx: mpsc::Receiver<Forward>,
    pub ack_rx: mpsc::Receiver<AckUpdate>,
}

/// Build a full engine around a manual clock starting at tick 0.
pub fn rig(cfg: EngineConfig) -> Rig {
    let clock = Arc::new(ManualClock::new(0));
    let (upstream, ring) = completion_ring(256);
    let bursts = BurstCounter::new();
    let (seg_tx, segs) = segment_ring(64, bursts.clone());
    let (fwd_tx, fwd_rx) = mpsc::channel(64);
    let (ack_tx, ack_rx) = mpsc::channel(64);
    let engine = PaceEngine::new(&cfg, clock.clone(), ring, segs, fwd_tx, ack_tx);
    Rig {
        engine,
        clock,
        upstream,
        seg_tx,
        bursts,
        fwd_rx,
        ack_rx,
    }
}

/// Default geometry with one tick of gap per rate unit.
pub fn tick_cfg() -> EngineConfig {
    EngineConfig {
        rate_gap_scale: 1,
        ..EngineConfig::default()
    }
}

pub fn paced(flow: u8, rate: u16, dst: u8) -> PacketDesc {
    PacketDesc {
        dst_q: dst,
        flags: FLAG_EOP,
        pacing: ((flow as u16) << 12) | (rate & 0x0fff),
        buf_lo: 0x1000 + (rate as u32),
        buf_hi: 1,
        ..PacketDesc::default()
    }
}

/// Fetch and admit until the upstream ring is empty, as a worker lane would.
pub async fn admit_all(r: &mut Rig) -> Result<(), EngineError> {
    while let Some(batch) = r.engine.fetch_batch().await? {
        r.engine.admit_batch(batch).await?;
    }
    Ok(())
}

/// Pump until `n` descriptors have been forwarded, advancing the clock one
/// slot whenever nothing is due, and firing every completion guard. Returns
/// the descriptors with the head time each was released at.
pub async fn collect_timed(r: &mut Rig, n: usize) -> Vec<(PacketDesc, u64)> {
    let mut out = Vec::new();
    while out.len() < n {
        let forwarded = r.engine.pump_once().await.unwrap();
        for _ in 0..forwarded {
            let fwd = r.fwd_rx.recv().await.unwrap();
            fwd.done.send(()).unwrap();
            out.push((fwd.desc, r.engine.head_time()));
        }
        if forwarded == 0 {
            r.clock.advance(32);
        }
    }
    out
}

pub async fn collect(r: &mut Rig, n: usize) -> Vec<PacketDesc> {
    collect_timed(r, n).await.into_iter().map(|(d, _)| d).collect()
}
