//! Error types for messaging domain values.

use thiserror::Error;

/// Errors returned while constructing messaging values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MessagingDomainError {
    /// Queue names must contain at least one non-whitespace character.
    #[error("queue name must not be empty")]
    EmptyQueueName,

    /// A delay could not be represented as a timestamp offset.
    #[error("delay of {0:?} is out of range")]
    DelayOutOfRange(std::time::Duration),
}

/// Error returned while encoding or decoding a message envelope.
#[derive(Debug, Error)]
#[error("invalid message envelope: {0}")]
pub struct MessageCodecError(#[from] pub serde_json::Error);
