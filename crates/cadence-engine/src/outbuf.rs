//! Output buffer set — the eight reusable forward buffers.
//!
//! Each buffer is guarded by a completion handshake: forwarding a descriptor
//! arms a oneshot the downstream consumer fires once the transmission is
//! acknowledged, and the buffer may not be reused until that guard has
//! resolved. Reuse is strict round-robin, so the least-recently-used buffer
//! is always the one waited on — approximate FIFO fairness, bounded at
//! eight descriptors in flight.
//!
//! The same rotation doubles as the staging gate for far-slot admissions:
//! `stage()` takes a turn through the rotation without arming a guard.

use cadence_core::desc::{PacketDesc, OUT_BUFS};
use tokio::sync::{mpsc, oneshot};

use crate::error::EngineError;

/// One descriptor handed to the downstream work list. The consumer fires
/// `done` when the transmission completes, freeing the originating buffer.
#[derive(Debug)]
pub struct Forward {
    pub desc: PacketDesc,
    pub done: oneshot::Sender<()>,
}

/// One batched acknowledgement: `count` packets forwarded to `dst_q`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckUpdate {
    pub dst_q: u8,
    pub count: u32,
}

pub struct OutputBufferSet {
    guards: [Option<oneshot::Receiver<()>>; OUT_BUFS],
    next: usize,
    tx: mpsc::Sender<Forward>,
}

impl OutputBufferSet {
    pub fn new(tx: mpsc::Sender<Forward>) -> Self {
        Self {
            guards: Default::default(),
            next: 0,
            tx,
        }
    }

    /// Index of the buffer the next forward will use.
    pub fn next_buffer(&self) -> usize {
        self.next
    }

    /// Wait until the least-recently-used buffer's previous transmission has
    /// completed. Does not advance the rotation; a caller that decides not
    /// to forward after waiting leaves the set unchanged. Cancellation-safe:
    /// the guard stays armed until it actually resolves.
    pub async fn wait_free(&mut self) -> Result<(), EngineError> {
        if let Some(guard) = self.guards[self.next].as_mut() {
            guard.await.map_err(|_| EngineError::Shutdown)?;
            self.guards[self.next] = None;
        }
        Ok(())
    }

    /// Forward a descriptor through the current buffer and arm its guard.
    /// The buffer must be free; anything else is a concurrency bug.
    pub async fn forward(&mut self, desc: PacketDesc) -> Result<(), EngineError> {
        let index = self.next;
        if self.guards[index].is_some() {
            return Err(EngineError::BufferGuardViolation { index });
        }
        let (done, guard) = oneshot::channel();
        self.tx
            .send(Forward { desc, done })
            .await
            .map_err(|_| EngineError::Shutdown)?;
        self.guards[index] = Some(guard);
        self.next = (index + 1) % OUT_BUFS;
        Ok(())
    }

    /// Take one turn through the rotation as a write gate: wait for the LRU
    /// buffer's prior use to complete, then move on without arming a guard.
    pub async fn stage(&mut self) -> Result<(), EngineError> {
        self.wait_free().await?;
        self.next = (self.next + 1) % OUT_BUFS;
        Ok(())
    }
}

/// Per-destination acknowledgement batching. Counts dequeued packets and
/// flushes downstream in units of `ACK_BATCH`, blocking only when the
/// acknowledgement channel itself is busy.
pub struct AckBatcher {
    pending: [u32; 256],
    tx: mpsc::Sender<AckUpdate>,
}

impl AckBatcher {
    pub fn new(tx: mpsc::Sender<AckUpdate>) -> Self {
        Self {
            pending: [0; 256],
            tx,
        }
    }

    pub async fn on_dequeue(&mut self, dst_q: u8) -> Result<(), EngineError> {
        use cadence_core::desc::ACK_BATCH;

        let slot = &mut self.pending[dst_q as usize];
        *slot += 1;
        if *slot >= ACK_BATCH {
            self.tx
                .send(AckUpdate {
                    dst_q,
                    count: ACK_BATCH,
                })
                .await
                .map_err(|_| EngineError::Shutdown)?;
            self.pending[dst_q as usize] -= ACK_BATCH;
        }
        Ok(())
    }

    pub fn pending(&self, dst_q: u8) -> u32 {
        self.pending[dst_q as usize]
    }
}
