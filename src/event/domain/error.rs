//! Error types for the event domain.

use super::WorkerPhase;
use thiserror::Error;

/// Errors returned by event domain operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventDomainError {
    /// The worker phase change is not in the transition table.
    #[error("worker cannot move from {from} to {to}")]
    InvalidWorkerTransition {
        /// Current phase.
        from: WorkerPhase,
        /// Requested phase.
        to: WorkerPhase,
    },

    /// Events need a source.
    #[error("event source must not be empty")]
    EmptySource,

    /// Events need a type.
    #[error("event type must not be empty")]
    EmptyType,
}

/// Error returned when parsing a worker phase from persisted storage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown worker phase: {0}")]
pub struct ParseWorkerPhaseError(pub String);

/// Error returned when parsing a job phase from persisted storage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown job phase: {0}")]
pub struct ParseJobPhaseError(pub String);
