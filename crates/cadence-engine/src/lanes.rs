//! Lane loops — the long-running tasks the daemon spawns around one engine.
//!
//! Worker lanes fetch and admit upstream batches under two turn rotations,
//! one for fetch order and one for admit order, so batches enter the wheel
//! in the order the producer completed them regardless of how the lanes are
//! scheduled. Pump lanes share a third rotation over the sync + dequeue
//! side. All lanes exit on the shutdown broadcast or on the first engine
//! error, which the daemon treats as fatal.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::engine::PaceEngine;
use crate::error::EngineError;
use crate::rotation::TurnHandle;

/// One admission worker. Takes its fetch turn, claims a batch (or observes
/// an empty ring), then takes its admit turn and feeds the batch to the
/// wheel. A lane that saw nothing parks until the producer delivers.
pub async fn worker_lane(
    engine: Arc<PaceEngine>,
    mut fetch_turn: TurnHandle,
    mut admit_turn: TurnHandle,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), EngineError> {
    let lane = fetch_turn.lane();
    debug!(lane, "worker lane up");
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                info!(lane, "worker lane stopping");
                return Ok(());
            }
            res = worker_cycle(&engine, &mut fetch_turn, &mut admit_turn) => res?,
        }
    }
}

async fn worker_cycle(
    engine: &PaceEngine,
    fetch_turn: &mut TurnHandle,
    admit_turn: &mut TurnHandle,
) -> Result<(), EngineError> {
    fetch_turn.take().await?;
    let batch = engine.fetch_batch().await?;
    fetch_turn.pass();

    admit_turn.take().await?;
    let empty = batch.is_none();
    if let Some(batch) = batch {
        engine.admit_batch(batch).await?;
    }
    admit_turn.pass();

    if empty {
        engine.wait_upstream().await?;
    }
    Ok(())
}

/// One pump lane. Runs the synchronizer and drains due head slots; when the
/// head slot has not elapsed, sleeps until it will.
pub async fn pump_lane(
    engine: Arc<PaceEngine>,
    mut turn: TurnHandle,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), EngineError> {
    let lane = turn.lane();
    debug!(lane, "pump lane up");
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                info!(lane, "pump lane stopping");
                return Ok(());
            }
            res = pump_cycle(&engine, &mut turn) => res?,
        }
    }
}

async fn pump_cycle(engine: &PaceEngine, turn: &mut TurnHandle) -> Result<(), EngineError> {
    turn.take().await?;
    engine.sync();
    let forwarded = engine.pump_once().await?;
    turn.pass();

    if forwarded == 0 {
        let delay = engine.idle_delay();
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }
    }
    Ok(())
}
