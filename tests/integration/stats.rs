use crate::*;

/// The stats snapshot serializes to the JSON shape the daemon logs.
#[tokio::test]
async fn snapshot_serializes_engine_counters() {
    let mut r = rig(tick_cfg());
    r.upstream.push_batch([paced(0, 0, 1); 8]).await.unwrap();
    admit_all(&mut r).await.unwrap();
    r.clock.advance(32 * 8);
    collect(&mut r, 8).await;

    let value = serde_json::to_value(r.engine.snapshot()).unwrap();
    assert_eq!(value["admitted"], 8);
    assert_eq!(value["forwarded"], 8);
    assert_eq!(value["scheduled"], 0);
    assert_eq!(value["bursts"], 0);
    assert!(value["head_time"].as_u64().unwrap() >= 8 * 32);
}
