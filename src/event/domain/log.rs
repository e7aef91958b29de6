//! Log lines produced by workers and jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One line of container output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the line was written, if known.
    pub time: Option<DateTime<Utc>>,
    /// The line itself.
    pub message: String,
}

/// The container whose logs are requested.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogSource {
    /// The worker's main container.
    Worker,
    /// The worker's source checkout init container.
    WorkerInit,
    /// A job's main container.
    Job(String),
    /// A job's source checkout init container.
    JobInit(String),
}

impl LogSource {
    /// Returns the job name for job sources.
    #[must_use]
    pub fn job_name(&self) -> Option<&str> {
        match self {
            Self::Worker | Self::WorkerInit => None,
            Self::Job(name) | Self::JobInit(name) => Some(name),
        }
    }
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Worker => f.write_str("worker"),
            Self::WorkerInit => f.write_str("worker init"),
            Self::Job(name) => write!(f, "job {name}"),
            Self::JobInit(name) => write!(f, "job {name} init"),
        }
    }
}
