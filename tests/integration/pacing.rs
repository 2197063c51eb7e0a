use crate::*;

use cadence_core::config::EngineConfig;

/// Packets of one flow leave one inter-packet gap apart: rate 100 at one
/// tick per unit chains departures 100, 200, 300, which land three slots
/// apart on a 32-tick wheel.
#[tokio::test]
async fn flow_departures_are_gap_spaced() {
    let mut r = rig(tick_cfg());
    let mut batch = [paced(0, 0, 1); 8];
    for slot in batch.iter_mut().take(3) {
        *slot = paced(1, 100, 2);
    }
    r.upstream.push_batch(batch).await.unwrap();
    admit_all(&mut r).await.unwrap();
    assert_eq!(r.engine.flow_last(1), 300);

    let out = collect_timed(&mut r, 8).await;
    let released: Vec<u64> = out
        .iter()
        .filter(|(d, _)| d.dst_q == 2)
        .map(|(_, at)| *at)
        .collect();
    assert_eq!(released.len(), 3);
    assert_eq!(released[1] - released[0], 96);
    assert_eq!(released[2] - released[1], 96);
}

/// Rate code zero means no pacing: the whole batch drains in admission
/// order as soon as its head slots elapse.
#[tokio::test]
async fn zero_rate_flow_is_unpaced() {
    let mut r = rig(tick_cfg());
    let mut batch = [paced(0, 0, 1); 8];
    for (i, slot) in batch.iter_mut().enumerate() {
        slot.offset = i as u16;
    }
    r.upstream.push_batch(batch).await.unwrap();
    admit_all(&mut r).await.unwrap();

    r.clock.advance(32 * 8);
    let out = collect(&mut r, 8).await;
    let offsets: Vec<u16> = out.iter().map(|d| d.offset).collect();
    assert_eq!(offsets, vec![0, 1, 2, 3, 4, 5, 6, 7]);
}

/// A flow paced far beyond the horizon is folded back to it, and stays
/// pinned there while the overload lasts.
#[tokio::test]
async fn runaway_flow_is_pinned_to_horizon() {
    let cfg = EngineConfig {
        rate_gap_scale: 1000,
        ..EngineConfig::default()
    };
    let horizon_ticks = cfg.horizon_slots << cfg.slot_shift;
    let mut r = rig(cfg);

    let mut batch = [paced(0, 0, 1); 8];
    batch[0] = paced(3, 0x0fff, 1);
    r.upstream.push_batch(batch).await.unwrap();
    admit_all(&mut r).await.unwrap();
    assert_eq!(r.engine.flow_last(3), horizon_ticks);

    // The next packet chains off the folded value and folds again
    let mut batch = [paced(0, 0, 1); 8];
    batch[0] = paced(3, 1, 1);
    r.upstream.push_batch(batch).await.unwrap();
    admit_all(&mut r).await.unwrap();
    assert_eq!(r.engine.flow_last(3), horizon_ticks);
}
