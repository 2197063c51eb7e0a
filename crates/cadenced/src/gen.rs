//! Built-in load generator — the daemon's upstream producer.
//!
//! Emits fixed-size batches of finished-packet descriptors, cycling flows
//! and destinations, and optionally interleaves segmented bursts carried on
//! the side ring. Production throttles on the served counter the engine
//! reflects back, so the ring never runs more than a window ahead.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info};

use cadence_core::config::GeneratorConfig;
use cadence_core::desc::{PacketDesc, SegmentDesc, BATCH_SIZE, FLAG_EOP, SEG_CONT, SEG_LAST};
use cadence_engine::{BurstCounter, EngineError, UpstreamHandle};

/// Max descriptors delivered but not yet served before production pauses.
const INFLIGHT_WINDOW: u64 = 128;

pub async fn run(
    cfg: GeneratorConfig,
    upstream: UpstreamHandle,
    seg_tx: mpsc::Sender<SegmentDesc>,
    bursts: Arc<BurstCounter>,
    mut served_rx: watch::Receiver<u64>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), EngineError> {
    let counters = upstream.counters();
    let interval = std::time::Duration::from_micros(cfg.batch_interval_us);
    let flows = cfg.flows.max(1) as u64;
    let destinations = cfg.destinations.max(1) as u64;
    let mut next_handle: u64 = 1;
    let mut burst_seq: u32 = 0;
    let mut produced: u64 = 0;
    info!(
        rate_code = cfg.rate_code,
        flows = cfg.flows,
        destinations = cfg.destinations,
        "load generator up"
    );

    loop {
        if cfg.batches > 0 && produced == cfg.batches {
            info!(produced, "load generator done");
            return Ok(());
        }
        tokio::select! {
            _ = shutdown.recv() => return Ok(()),
            _ = tokio::time::sleep(interval) => {}
        }

        // Throttle on the reflected served counter
        while counters.available() >= INFLIGHT_WINDOW {
            if served_rx.changed().await.is_err() {
                return Ok(());
            }
        }

        let mut batch = [PacketDesc::default(); BATCH_SIZE];
        for (i, slot) in batch.iter_mut().enumerate() {
            let n = produced.wrapping_mul(BATCH_SIZE as u64) + i as u64;
            *slot = PacketDesc {
                dst_q: (n % destinations) as u8,
                flags: FLAG_EOP,
                pacing: (((n % flows) as u16 & 0x0f) << 12) | (cfg.rate_code & 0x0fff),
                buf_lo: next_handle as u32,
                buf_hi: (next_handle >> 32) as u8,
                ..PacketDesc::default()
            };
            next_handle += 1;
        }

        let segmented =
            cfg.segmented_every > 0 && produced % cfg.segmented_every == cfg.segmented_every - 1;
        if segmented {
            // Turn the first descriptor into a burst announcement and put the
            // segments on the side ring before the batch lands
            batch[0].flags = 0;
            batch[0].seg = SEG_CONT;
            for s in 0..cfg.segments_per_burst {
                burst_seq = burst_seq.wrapping_add(1);
                let last = s + 1 == cfg.segments_per_burst;
                let seg = SegmentDesc {
                    desc: PacketDesc {
                        dst_q: batch[0].dst_q,
                        flags: FLAG_EOP,
                        seg: if last { SEG_LAST } else { SEG_CONT },
                        buf_lo: next_handle as u32,
                        buf_hi: (next_handle >> 32) as u8,
                        ..PacketDesc::default()
                    },
                    burst_seq,
                };
                next_handle += 1;
                if seg_tx.send(seg).await.is_err() {
                    return Ok(());
                }
                bursts.advance(1);
            }
            debug!(segments = cfg.segments_per_burst, "segmented burst produced");
        }

        upstream.push_batch(batch).await?;
        produced += 1;
    }
}
