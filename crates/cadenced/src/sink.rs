//! Work-list sink — stands in for the downstream transmit stage.
//!
//! Consumes forwarded descriptors, fires their completion guards so the
//! engine's output buffers recycle, and drains the acknowledgement channel.

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace};

use cadence_engine::{AckUpdate, Forward};

pub async fn run(
    mut fwd_rx: mpsc::Receiver<Forward>,
    mut ack_rx: mpsc::Receiver<AckUpdate>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut delivered: u64 = 0;
    let mut acked: u64 = 0;
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                info!(delivered, acked, "work list sink stopping");
                return;
            }
            fwd = fwd_rx.recv() => match fwd {
                Some(fwd) => {
                    let dst = fwd.desc.dst_q;
                    let seq = fwd.desc.seq;
                    trace!(dst, seq, "descriptor delivered");
                    delivered += 1;
                    let _ = fwd.done.send(());
                }
                None => return,
            },
            ack = ack_rx.recv() => match ack {
                Some(ack) => {
                    debug!(dst_q = ack.dst_q, count = ack.count, "ack batch");
                    acked += ack.count as u64;
                }
                None => return,
            },
        }
    }
}
