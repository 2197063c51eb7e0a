use crate::*;

use cadence_core::config::EngineConfig;
use cadence_engine::EngineError;

/// The slot allocator probes a bounded window. With a single probe word the
/// window is 64 slots, so the 65th immediate packet has nowhere to go and
/// the engine halts rather than dropping or delaying it silently.
#[tokio::test]
async fn probe_window_exhaustion_halts() {
    let mut r = rig(EngineConfig {
        probe_words: 1,
        ..tick_cfg()
    });
    for _ in 0..8 {
        r.upstream.push_batch([paced(0, 0, 1); 8]).await.unwrap();
    }
    admit_all(&mut r).await.unwrap();
    assert_eq!(r.engine.scheduled(), 64);

    r.upstream.push_batch([paced(0, 0, 1); 8]).await.unwrap();
    let err = admit_all(&mut r).await.unwrap_err();
    assert!(matches!(err, EngineError::CapacityExceeded { .. }));
    assert_eq!(err.diag_code(), 2);
    assert!(err.is_fatal());
}

/// Draining the wheel frees its slots: after a full probe window is
/// scheduled and forwarded, the same window admits a fresh batch.
#[tokio::test]
async fn capacity_recovers_after_drain() {
    let mut r = rig(EngineConfig {
        probe_words: 1,
        ..tick_cfg()
    });
    for _ in 0..8 {
        r.upstream.push_batch([paced(0, 0, 1); 8]).await.unwrap();
    }
    admit_all(&mut r).await.unwrap();

    r.clock.advance(32 * 64);
    let out = collect(&mut r, 64).await;
    assert_eq!(out.len(), 64);
    assert_eq!(r.engine.scheduled(), 0);

    r.upstream.push_batch([paced(0, 0, 1); 8]).await.unwrap();
    admit_all(&mut r).await.unwrap();
    assert_eq!(r.engine.scheduled(), 8);
}
