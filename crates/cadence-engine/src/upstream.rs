//! Upstream collaborators: the completion ring and the segmented-burst side
//! ring, plus the complete/served counter pair that paces consumption.
//!
//! The counter protocol is single-writer on each side: the producer advances
//! `complete` once per descriptor delivered, the engine advances `served`
//! once per batch consumed. A separate publisher task reflects `served` back
//! to the producer, suppressing notifications when the value has not moved
//! since the last send.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Notify};

use cadence_core::desc::{PacketDesc, SegmentDesc, BATCH_SIZE};

use crate::error::EngineError;

// ── Completion counters ──────────────────────────────────────────────────────

pub struct SeqCounters {
    complete: AtomicU64,
    served: AtomicU64,
    served_note: Notify,
}

impl SeqCounters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            complete: AtomicU64::new(0),
            served: AtomicU64::new(0),
            served_note: Notify::new(),
        })
    }

    pub fn complete(&self) -> u64 {
        self.complete.load(Ordering::Acquire)
    }

    pub fn served(&self) -> u64 {
        self.served.load(Ordering::Acquire)
    }

    /// Descriptors delivered but not yet consumed.
    pub fn available(&self) -> u64 {
        self.complete() - self.served()
    }

    fn add_complete(&self, n: u64) {
        self.complete.fetch_add(n, Ordering::AcqRel);
    }

    fn add_served(&self, n: u64) {
        self.served.fetch_add(n, Ordering::AcqRel);
        self.served_note.notify_one();
    }
}

// ── Completion ring ──────────────────────────────────────────────────────────

/// Producer side of the completion ring.
pub struct UpstreamHandle {
    tx: mpsc::Sender<PacketDesc>,
    counters: Arc<SeqCounters>,
    complete_tx: watch::Sender<u64>,
}

impl UpstreamHandle {
    /// Deliver one full batch. `complete` advances only after every
    /// descriptor is on the ring.
    pub async fn push_batch(&self, batch: [PacketDesc; BATCH_SIZE]) -> Result<(), EngineError> {
        for desc in batch {
            self.tx.send(desc).await.map_err(|_| EngineError::Shutdown)?;
        }
        self.counters.add_complete(BATCH_SIZE as u64);
        self.complete_tx.send_replace(self.counters.complete());
        Ok(())
    }

    /// Deliver a partial batch; the engine will consume it one descriptor at
    /// a time while waiting for the remainder.
    pub async fn push_partial(&self, descs: &[PacketDesc]) -> Result<(), EngineError> {
        debug_assert!(descs.len() < BATCH_SIZE);
        for desc in descs {
            self.tx.send(*desc).await.map_err(|_| EngineError::Shutdown)?;
        }
        self.counters.add_complete(descs.len() as u64);
        self.complete_tx.send_replace(self.counters.complete());
        Ok(())
    }

    pub fn counters(&self) -> Arc<SeqCounters> {
        self.counters.clone()
    }
}

/// Engine side of the completion ring.
pub struct UpstreamRing {
    rx: mpsc::Receiver<PacketDesc>,
    counters: Arc<SeqCounters>,
    complete_rx: watch::Receiver<u64>,
}

impl UpstreamRing {
    pub fn available(&self) -> u64 {
        self.counters.available()
    }

    pub fn counters(&self) -> Arc<SeqCounters> {
        self.counters.clone()
    }

    pub async fn recv(&mut self) -> Result<PacketDesc, EngineError> {
        self.rx.recv().await.ok_or(EngineError::Shutdown)
    }

    /// Advance the served counter after a batch is fully fetched.
    pub fn mark_served(&self, n: u64) {
        self.counters.add_served(n);
    }

    /// Park until the producer has delivered something.
    pub async fn wait_nonempty(&mut self) -> Result<(), EngineError> {
        while self.counters.available() == 0 {
            self.complete_rx
                .changed()
                .await
                .map_err(|_| EngineError::Shutdown)?;
        }
        Ok(())
    }
}

/// Create a linked completion ring pair.
pub fn completion_ring(capacity: usize) -> (UpstreamHandle, UpstreamRing) {
    let (tx, rx) = mpsc::channel(capacity);
    let counters = SeqCounters::new();
    let (complete_tx, complete_rx) = watch::channel(0u64);
    (
        UpstreamHandle {
            tx,
            counters: counters.clone(),
            complete_tx,
        },
        UpstreamRing {
            rx,
            counters,
            complete_rx,
        },
    )
}

// ── Served reflection ────────────────────────────────────────────────────────

/// Reflects the served counter back to the producer. Sends only when the
/// value has moved since the last notification.
pub struct ServedPublisher {
    counters: Arc<SeqCounters>,
    tx: watch::Sender<u64>,
    last_sent: u64,
}

impl ServedPublisher {
    pub fn new(counters: Arc<SeqCounters>) -> (Self, watch::Receiver<u64>) {
        let (tx, rx) = watch::channel(0u64);
        (
            Self {
                counters,
                tx,
                last_sent: 0,
            },
            rx,
        )
    }

    /// Publish if the counter moved. Returns whether a notification went out.
    pub fn publish(&mut self) -> bool {
        let served = self.counters.served();
        if served != self.last_sent {
            self.last_sent = served;
            self.tx.send_replace(served);
            true
        } else {
            false
        }
    }

    /// Run until the engine shuts down, publishing on every served advance.
    pub async fn run(mut self) {
        loop {
            self.counters.served_note.notified().await;
            self.publish();
            if self.tx.is_closed() {
                return;
            }
        }
    }
}

// ── Segmented-burst side ring ────────────────────────────────────────────────

/// Completion-sequence counter for in-flight segment transfers.
/// Single writer (the producer); the engine only polls it.
pub struct BurstCounter {
    seq: AtomicU32,
}

impl BurstCounter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            seq: AtomicU32::new(0),
        })
    }

    pub fn advance(&self, n: u32) {
        self.seq.fetch_add(n, Ordering::AcqRel);
    }

    pub fn get(&self) -> u32 {
        self.seq.load(Ordering::Acquire)
    }
}

/// True while `target` is still ahead of the completion counter, with
/// wrap-around handled by signed distance.
pub fn seq_behind(target: u32, completed: u32) -> bool {
    target.wrapping_sub(completed) as i32 > 0
}

/// Engine side of the segment side ring.
pub struct SegmentRing {
    rx: mpsc::Receiver<SegmentDesc>,
    completed: Arc<BurstCounter>,
}

impl SegmentRing {
    pub async fn next(&mut self) -> Result<SegmentDesc, EngineError> {
        self.rx.recv().await.ok_or(EngineError::Shutdown)
    }

    pub fn completed(&self) -> u32 {
        self.completed.get()
    }
}

pub fn segment_ring(
    capacity: usize,
    completed: Arc<BurstCounter>,
) -> (mpsc::Sender<SegmentDesc>, SegmentRing) {
    let (tx, rx) = mpsc::channel(capacity);
    (tx, SegmentRing { rx, completed })
}
