//! Error types for project domain values.

use thiserror::Error;

/// Errors returned while constructing project values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProjectDomainError {
    /// Project identifiers must not be blank.
    #[error("project identifier must not be empty")]
    EmptyProjectId,

    /// Project identifiers become part of cluster resource names.
    #[error(
        "invalid project identifier {0:?}: use lowercase letters, digits and '-', starting with a letter"
    )]
    InvalidProjectId(String),

    /// Secret keys must not be blank.
    #[error("secret key must not be empty")]
    EmptySecretKey,
}

/// Error returned when parsing a log level from persisted storage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown log level: {0}")]
pub struct ParseLogLevelError(pub String);
