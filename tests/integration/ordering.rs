use crate::*;

use std::sync::Arc;

use tokio::sync::broadcast;

use cadence_core::clock::MonotonicClock;
use cadence_core::config::EngineConfig;
use cadence_engine::{
    completion_ring, pump_lane, segment_ring, worker_lane, BurstCounter, PaceEngine, Rotation,
};

/// The daemon's full lane wiring under a real clock: two worker lanes and
/// two pump lanes race over one engine, and per-destination sequence
/// numbers still come out strictly in order.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_lanes_preserve_sequence_order() {
    let cfg = EngineConfig::default();
    let clock = Arc::new(MonotonicClock::new(cfg.tick_ns));
    let (upstream, ring) = completion_ring(256);
    let (_seg_tx, segs) = segment_ring(16, BurstCounter::new());
    let (fwd_tx, mut fwd_rx) = tokio::sync::mpsc::channel(64);
    let (ack_tx, mut ack_rx) = tokio::sync::mpsc::channel(64);
    let engine = PaceEngine::new(&cfg, clock, ring, segs, fwd_tx, ack_tx);

    let (shutdown_tx, _) = broadcast::channel(1);
    let fetch = Rotation::new(2);
    let admit = Rotation::new(2);
    let pump = Rotation::new(2);
    let mut tasks = Vec::new();
    for lane in 0..2 {
        tasks.push(tokio::spawn(worker_lane(
            engine.clone(),
            fetch.handle(lane),
            admit.handle(lane),
            shutdown_tx.subscribe(),
        )));
        tasks.push(tokio::spawn(pump_lane(
            engine.clone(),
            pump.handle(lane),
            shutdown_tx.subscribe(),
        )));
    }

    for _ in 0..8 {
        upstream.push_batch([paced(0, 0, 3); 8]).await.unwrap();
    }

    let mut seqs = Vec::new();
    for _ in 0..64 {
        let fwd = fwd_rx.recv().await.unwrap();
        assert_eq!(fwd.desc.dst_q, 3);
        seqs.push(fwd.desc.seq);
        fwd.done.send(()).unwrap();
    }
    let expected: Vec<u16> = (0u16..64).collect();
    assert_eq!(seqs, expected);

    // 64 forwards to one destination flush exactly 8 ack batches
    let mut acked = 0;
    for _ in 0..8 {
        let ack = ack_rx.recv().await.unwrap();
        assert_eq!(ack.dst_q, 3);
        acked += ack.count;
    }
    assert_eq!(acked, 64);

    shutdown_tx.send(()).unwrap();
    for task in tasks {
        task.await.unwrap().unwrap();
    }
}
