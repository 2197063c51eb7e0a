//! cadence-engine — the per-flow traffic-pacing scheduler.
//!
//! A time-indexed circular queue: finished packet descriptors are held in a
//! wheel of slots and released when the wheel head passes their computed
//! departure time. Storage is split into a large slow tier and a small fast
//! tier that alone serves the dequeue hot path; a batched synchronizer keeps
//! the fast tier populated as the head advances. Multiple worker lanes admit
//! upstream batches under a strict turn rotation so shared wheel state needs
//! no per-operation locking discipline beyond a single uncontended lock.

pub mod bitmap;
pub mod engine;
pub mod error;
pub mod flow;
pub mod lanes;
pub mod outbuf;
pub mod rotation;
pub mod store;
pub mod upstream;
pub mod wheel;

pub use engine::{PaceEngine, StatsSnapshot};
pub use error::EngineError;
pub use lanes::{pump_lane, worker_lane};
pub use outbuf::{AckUpdate, Forward};
pub use rotation::{Rotation, TurnHandle};
pub use upstream::{
    completion_ring, segment_ring, BurstCounter, SegmentRing, SeqCounters, ServedPublisher,
    UpstreamHandle, UpstreamRing,
};
