//! cadenced — traffic-pacing daemon.
//!
//! Wires a built-in load generator (the upstream producer), the pacing
//! engine with its worker and pump lanes, and a work-list sink standing in
//! for the downstream transmit stage.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;

use cadence_core::clock::MonotonicClock;
use cadence_core::config::CadenceConfig;
use cadence_engine::{
    completion_ring, pump_lane, segment_ring, worker_lane, BurstCounter, PaceEngine, Rotation,
    ServedPublisher,
};

mod gen;
mod sink;
mod stats;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = CadenceConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = CadenceConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        CadenceConfig::default()
    });
    config
        .engine
        .validate()
        .context("invalid engine configuration")?;
    tracing::info!(
        slow = config.engine.slow_capacity,
        fast = config.engine.fast_capacity,
        lanes = config.engine.lanes,
        pump_lanes = config.engine.pump_lanes,
        tick_ns = config.engine.tick_ns,
        "cadenced starting"
    );

    let clock = Arc::new(MonotonicClock::new(config.engine.tick_ns));

    // Rings and channels
    let (upstream, upstream_ring) = completion_ring(256);
    let counters = upstream.counters();
    let bursts = BurstCounter::new();
    let (seg_tx, seg_ring) = segment_ring(64, bursts.clone());
    let (fwd_tx, fwd_rx) = mpsc::channel(64);
    let (ack_tx, ack_rx) = mpsc::channel(64);

    let engine = PaceEngine::new(
        &config.engine,
        clock,
        upstream_ring,
        seg_ring,
        fwd_tx,
        ack_tx,
    );

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // Served counter reflected back to the producer
    let (publisher, served_rx) = ServedPublisher::new(counters);
    tokio::spawn(publisher.run());

    // ── Spawn lanes ──────────────────────────────────────────────────────────
    let mut lanes = JoinSet::new();
    let fetch = Rotation::new(config.engine.lanes);
    let admit = Rotation::new(config.engine.lanes);
    for lane in 0..config.engine.lanes {
        lanes.spawn(worker_lane(
            engine.clone(),
            fetch.handle(lane),
            admit.handle(lane),
            shutdown_tx.subscribe(),
        ));
    }
    let pump = Rotation::new(config.engine.pump_lanes);
    for lane in 0..config.engine.pump_lanes {
        lanes.spawn(pump_lane(
            engine.clone(),
            pump.handle(lane),
            shutdown_tx.subscribe(),
        ));
    }

    let _generator_task = tokio::spawn(gen::run(
        config.generator.clone(),
        upstream,
        seg_tx,
        bursts,
        served_rx,
        shutdown_tx.subscribe(),
    ));
    let sink_task = tokio::spawn(sink::run(fwd_rx, ack_rx, shutdown_tx.subscribe()));
    let stats_task = tokio::spawn(stats::run(
        engine.clone(),
        config.stats.interval_secs,
        shutdown_tx.subscribe(),
    ));

    // ── Wait for exit ────────────────────────────────────────────────────────
    let mut shutdown_rx = shutdown_tx.subscribe();
    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        Some(res) = lanes.join_next() => match res {
            Ok(Ok(())) => tracing::info!("lane exited"),
            Ok(Err(e)) if e.is_fatal() => {
                tracing::error!(error = %e, diag = e.diag_code(), "engine halted");
                std::process::exit(e.diag_code());
            }
            Ok(Err(_)) => tracing::info!("lane shut down"),
            Err(e) => tracing::error!(error = %e, "lane panicked"),
        },
        r = sink_task => tracing::error!("sink exited: {:?}", r),
        r = stats_task => tracing::error!("stats task exited: {:?}", r),
    }

    Ok(())
}
