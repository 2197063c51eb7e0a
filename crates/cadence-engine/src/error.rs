//! Engine error taxonomy.
//!
//! There is no degraded mode: capacity and guard failures indicate either a
//! misconfiguration or a concurrency bug, and the wheel guarantees no
//! overwrite and no silent drop. The daemon turns fatal errors into process
//! exit with the diagnostic code so postmortems can tell the failures apart.

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No free slot within the bounded probe window. Rate/horizon
    /// misconfiguration or a capacity leak.
    #[error("no free slot within {probe_slots} slots at or after slot {desired}")]
    CapacityExceeded { desired: usize, probe_slots: usize },

    /// An output buffer was handed out while its previous transmission was
    /// still unacknowledged.
    #[error("output buffer {index} reused before completion")]
    BufferGuardViolation { index: usize },

    /// Malformed descriptor caught by the admission debug checks.
    #[error("invalid descriptor: {reason}")]
    InvalidDescriptor { reason: &'static str },

    /// A collaborator channel closed; the engine is winding down.
    #[error("engine channel closed, shutting down")]
    Shutdown,
}

impl EngineError {
    /// Process exit code identifying which invariant failed.
    pub fn diag_code(&self) -> i32 {
        match self {
            EngineError::CapacityExceeded { .. } => 2,
            EngineError::BufferGuardViolation { .. } => 3,
            EngineError::InvalidDescriptor { .. } => 4,
            EngineError::Shutdown => 0,
        }
    }

    pub fn is_fatal(&self) -> bool {
        !matches!(self, EngineError::Shutdown)
    }
}
