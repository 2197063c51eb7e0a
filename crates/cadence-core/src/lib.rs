//! cadence-core — shared primitives for the Cadence pacing engine.
//!
//! This crate has no I/O and no async code: descriptor wire types,
//! configuration, and the tick clock abstraction. Everything that moves
//! packets lives in `cadence-engine`.

pub mod clock;
pub mod config;
pub mod desc;
