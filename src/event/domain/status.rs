//! Worker and job status documents.
//!
//! Status documents are replaced wholesale by the process that owns them.

use super::{JobPhase, WorkerPhase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Observed state of an event's worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatus {
    /// When the worker started.
    pub started: Option<DateTime<Utc>>,
    /// When the worker finished.
    pub ended: Option<DateTime<Utc>>,
    /// Current phase.
    pub phase: WorkerPhase,
}

impl WorkerStatus {
    /// Creates a status in `phase` with no timestamps.
    #[must_use]
    pub const fn in_phase(phase: WorkerPhase) -> Self {
        Self {
            started: None,
            ended: None,
            phase,
        }
    }
}

/// Observed state of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    /// When the job started.
    pub started: Option<DateTime<Utc>>,
    /// When the job finished.
    pub ended: Option<DateTime<Utc>>,
    /// Current phase.
    pub phase: JobPhase,
}

/// Worker status plus the status of every job, keyed by job name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStatus {
    /// Worker status.
    pub worker_status: WorkerStatus,
    /// Job statuses keyed by job name.
    #[serde(default)]
    pub job_statuses: BTreeMap<String, JobStatus>,
}

impl EventStatus {
    /// Status of a freshly created event.
    #[must_use]
    pub const fn pending() -> Self {
        Self {
            worker_status: WorkerStatus::in_phase(WorkerPhase::Pending),
            job_statuses: BTreeMap::new(),
        }
    }
}
