use crate::*;

/// Acknowledgements flow downstream in per-destination batches of eight,
/// never per packet.
#[tokio::test]
async fn acks_flush_in_destination_batches() {
    let mut r = rig(tick_cfg());
    for _ in 0..2 {
        r.upstream.push_batch([paced(0, 0, 7); 8]).await.unwrap();
    }
    admit_all(&mut r).await.unwrap();
    r.clock.advance(32 * 16);
    collect(&mut r, 16).await;

    for _ in 0..2 {
        let ack = r.ack_rx.try_recv().unwrap();
        assert_eq!(ack.dst_q, 7);
        assert_eq!(ack.count, 8);
    }
    assert!(r.ack_rx.try_recv().is_err());
}

/// Mixed destinations accumulate independently; no ack leaves until one
/// destination reaches a full batch.
#[tokio::test]
async fn partial_counts_do_not_flush() {
    let mut r = rig(tick_cfg());
    let mut batch = [paced(0, 0, 1); 8];
    for (i, slot) in batch.iter_mut().enumerate() {
        slot.dst_q = (i % 4) as u8;
    }
    r.upstream.push_batch(batch).await.unwrap();
    admit_all(&mut r).await.unwrap();
    r.clock.advance(32 * 8);
    collect(&mut r, 8).await;

    // Two packets per destination: nothing reaches the batch threshold
    assert!(r.ack_rx.try_recv().is_err());
}
