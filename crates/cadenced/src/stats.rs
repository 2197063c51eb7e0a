//! Periodic engine stats log line.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::info;

use cadence_engine::PaceEngine;

pub async fn run(engine: Arc<PaceEngine>, interval_secs: u64, mut shutdown: broadcast::Receiver<()>) {
    if interval_secs == 0 {
        let _ = shutdown.recv().await;
        return;
    }
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        tokio::select! {
            _ = shutdown.recv() => return,
            _ = interval.tick() => {
                let snapshot = engine.snapshot();
                let json = serde_json::to_string(&snapshot).unwrap_or_default();
                info!(stats = %json, "engine stats");
            }
        }
    }
}
