//! Worker and job phase state machines.

use super::{ParseJobPhaseError, ParseWorkerPhaseError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of an event's worker.
///
/// ```text
/// PENDING -> RUNNING -> SUCCEEDED | FAILED | TIMED_OUT
/// PENDING -> CANCELED
/// RUNNING -> ABORTED
/// ```
///
/// `UNKNOWN` is reported when the worker's state cannot be observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerPhase {
    /// Waiting to be scheduled.
    Pending,
    /// The worker pod is executing.
    Running,
    /// Canceled before it started.
    Canceled,
    /// Canceled while running.
    Aborted,
    /// Finished successfully.
    Succeeded,
    /// Finished unsuccessfully.
    Failed,
    /// Exceeded its time limit.
    TimedOut,
    /// State could not be determined.
    Unknown,
}

impl WorkerPhase {
    /// Every phase.
    pub const ALL: [Self; 8] = [
        Self::Pending,
        Self::Running,
        Self::Canceled,
        Self::Aborted,
        Self::Succeeded,
        Self::Failed,
        Self::TimedOut,
        Self::Unknown,
    ];

    /// Phases from which no further transition is possible.
    pub const TERMINAL: [Self; 5] = [
        Self::Canceled,
        Self::Aborted,
        Self::Succeeded,
        Self::Failed,
        Self::TimedOut,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Canceled => "CANCELED",
            Self::Aborted => "ABORTED",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::TimedOut => "TIMED_OUT",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Returns `true` when the worker has finished for good.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Canceled | Self::Aborted | Self::Succeeded | Self::Failed | Self::TimedOut
        )
    }

    /// Returns the phases reachable in one step from `self`.
    #[must_use]
    pub const fn allowed_transitions(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Running, Self::Canceled, Self::Failed, Self::Unknown],
            Self::Running => &[
                Self::Succeeded,
                Self::Failed,
                Self::TimedOut,
                Self::Aborted,
                Self::Unknown,
            ],
            Self::Unknown => &[
                Self::Running,
                Self::Succeeded,
                Self::Failed,
                Self::TimedOut,
                Self::Aborted,
            ],
            Self::Canceled | Self::Aborted | Self::Succeeded | Self::Failed | Self::TimedOut => {
                &[]
            }
        }
    }

    /// Returns `true` when a status update may move from `self` to `next`.
    /// Re-reporting the current phase is always allowed.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self == next || self.allowed_transitions().contains(&next)
    }
}

impl TryFrom<&str> for WorkerPhase {
    type Error = ParseWorkerPhaseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|phase| phase.as_str() == value)
            .ok_or_else(|| ParseWorkerPhaseError(value.to_owned()))
    }
}

impl fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle phase of a job launched by a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobPhase {
    /// Waiting to be scheduled.
    Pending,
    /// The job pod is executing.
    Running,
    /// Canceled while running.
    Aborted,
    /// Finished successfully.
    Succeeded,
    /// Finished unsuccessfully.
    Failed,
    /// Exceeded its time limit.
    TimedOut,
    /// State could not be determined.
    Unknown,
}

impl JobPhase {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Aborted => "ABORTED",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::TimedOut => "TIMED_OUT",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Returns `true` when the job has finished for good.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Aborted | Self::Succeeded | Self::Failed | Self::TimedOut
        )
    }
}

impl TryFrom<&str> for JobPhase {
    type Error = ParseJobPhaseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "ABORTED" => Ok(Self::Aborted),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "FAILED" => Ok(Self::Failed),
            "TIMED_OUT" => Ok(Self::TimedOut),
            "UNKNOWN" => Ok(Self::Unknown),
            _ => Err(ParseJobPhaseError(value.to_owned())),
        }
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
