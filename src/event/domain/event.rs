//! Event aggregate root.

use super::{EventDomainError, EventId, EventStatus, JobStatus, WorkerPhase, WorkerStatus};
use crate::project::domain::{EventLabels, ProjectId, WorkerSpec};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Event-level overrides of the project's git settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventGitConfig {
    /// Repository URL.
    #[serde(rename = "cloneURL")]
    pub clone_url: String,
    /// Commit to check out.
    pub commit: String,
    /// Branch or tag to check out.
    pub r#ref: String,
}

/// Caller-supplied attributes of an event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventDetails {
    /// Where the event came from, for example `github`.
    pub source: String,
    /// What happened, for example `push`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Labels used for subscription matching.
    pub labels: EventLabels,
    /// Short human-readable title.
    pub short_title: String,
    /// Long human-readable title.
    pub long_title: String,
    /// Git overrides for the worker.
    pub git: EventGitConfig,
    /// Opaque payload handed to the worker.
    pub payload: String,
}

impl EventDetails {
    /// Creates details with a source and type.
    #[must_use]
    pub fn new(source: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            event_type: event_type.into(),
            ..Self::default()
        }
    }

    /// Adds a label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Sets the git overrides.
    #[must_use]
    pub fn with_git(mut self, git: EventGitConfig) -> Self {
        self.git = git;
        self
    }

    /// Sets the titles.
    #[must_use]
    pub fn with_titles(mut self, short_title: impl Into<String>, long_title: impl Into<String>) -> Self {
        self.short_title = short_title.into();
        self.long_title = long_title.into();
        self
    }

    /// Checks that source and type are present.
    ///
    /// # Errors
    ///
    /// Returns [`EventDomainError::EmptySource`] or
    /// [`EventDomainError::EmptyType`].
    pub fn validate(&self) -> Result<(), EventDomainError> {
        if self.source.trim().is_empty() {
            return Err(EventDomainError::EmptySource);
        }
        if self.event_type.trim().is_empty() {
            return Err(EventDomainError::EmptyType);
        }
        Ok(())
    }
}

/// A request to run a worker for a project, and that worker's progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    id: EventId,
    #[serde(rename = "projectID")]
    project_id: ProjectId,
    #[serde(flatten)]
    details: EventDetails,
    worker: WorkerSpec,
    namespace: Option<String>,
    status: EventStatus,
    created: DateTime<Utc>,
    canceled: Option<DateTime<Utc>>,
}

/// Parameter object for reconstructing a persisted event.
#[derive(Debug, Clone)]
pub struct PersistedEventData {
    /// Persisted event identifier.
    pub id: EventId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Persisted caller-supplied attributes.
    pub details: EventDetails,
    /// Persisted resolved worker spec.
    pub worker: WorkerSpec,
    /// Persisted namespace, if scheduled.
    pub namespace: Option<String>,
    /// Persisted status.
    pub status: EventStatus,
    /// Persisted creation timestamp.
    pub created: DateTime<Utc>,
    /// Persisted cancellation timestamp.
    pub canceled: Option<DateTime<Utc>>,
}

impl Event {
    /// Creates a pending event with a fresh identifier.
    #[must_use]
    pub fn pending(
        project_id: ProjectId,
        details: EventDetails,
        worker: WorkerSpec,
        clock: &impl Clock,
    ) -> Self {
        Self {
            id: EventId::new(),
            project_id,
            details,
            worker,
            namespace: None,
            status: EventStatus::pending(),
            created: clock.utc(),
            canceled: None,
        }
    }

    /// Reconstructs an event from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedEventData) -> Self {
        Self {
            id: data.id,
            project_id: data.project_id,
            details: data.details,
            worker: data.worker,
            namespace: data.namespace,
            status: data.status,
            created: data.created,
            canceled: data.canceled,
        }
    }

    /// Records the namespace chosen by the scheduler.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Returns the event identifier.
    #[must_use]
    pub const fn id(&self) -> EventId {
        self.id
    }

    /// Returns the owning project.
    #[must_use]
    pub const fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    /// Returns the caller-supplied attributes.
    #[must_use]
    pub const fn details(&self) -> &EventDetails {
        &self.details
    }

    /// Returns the event source.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.details.source
    }

    /// Returns the event type.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.details.event_type
    }

    /// Returns the resolved worker spec.
    #[must_use]
    pub const fn worker(&self) -> &WorkerSpec {
        &self.worker
    }

    /// Returns the namespace, once scheduled.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Returns the status document.
    #[must_use]
    pub const fn status(&self) -> &EventStatus {
        &self.status
    }

    /// Returns the current worker phase.
    #[must_use]
    pub const fn worker_phase(&self) -> WorkerPhase {
        self.status.worker_status.phase
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Returns the cancellation timestamp, if canceled.
    #[must_use]
    pub const fn canceled(&self) -> Option<DateTime<Utc>> {
        self.canceled
    }

    /// Returns the phase a cancellation would move this event to, or `None`
    /// when the phase gate is not satisfied.
    ///
    /// Pending events become canceled. Running (and unknown) events become
    /// aborted, but only when `cancel_running` is set.
    #[must_use]
    pub const fn cancellation_target(&self, cancel_running: bool) -> Option<WorkerPhase> {
        match self.worker_phase() {
            WorkerPhase::Pending => Some(WorkerPhase::Canceled),
            WorkerPhase::Running | WorkerPhase::Unknown if cancel_running => {
                Some(WorkerPhase::Aborted)
            }
            _ => None,
        }
    }

    /// Returns `true` when a delete with these flags may remove the event.
    ///
    /// Terminal events are always deletable. Running (and unknown) events
    /// need `delete_running`; pending events need `delete_pending`.
    #[must_use]
    pub const fn is_deletable(&self, delete_pending: bool, delete_running: bool) -> bool {
        match self.worker_phase() {
            WorkerPhase::Pending => delete_pending,
            WorkerPhase::Running | WorkerPhase::Unknown => delete_running,
            WorkerPhase::Canceled
            | WorkerPhase::Aborted
            | WorkerPhase::Succeeded
            | WorkerPhase::Failed
            | WorkerPhase::TimedOut => true,
        }
    }

    /// Applies a cancellation if the phase gate allows it. Returns `true`
    /// when the event changed.
    pub fn cancel(&mut self, cancel_running: bool, at: DateTime<Utc>) -> bool {
        let Some(target) = self.cancellation_target(cancel_running) else {
            return false;
        };
        self.status.worker_status.phase = target;
        self.status.worker_status.ended = Some(at);
        self.canceled = Some(at);
        true
    }

    /// Replaces the worker status.
    ///
    /// # Errors
    ///
    /// Returns [`EventDomainError::InvalidWorkerTransition`] when the new
    /// phase is not reachable from the current one.
    pub fn replace_worker_status(&mut self, status: WorkerStatus) -> Result<(), EventDomainError> {
        let current = self.worker_phase();
        if !current.can_transition_to(status.phase) {
            return Err(EventDomainError::InvalidWorkerTransition {
                from: current,
                to: status.phase,
            });
        }
        self.status.worker_status = status;
        Ok(())
    }

    /// Replaces the status of one job.
    pub fn replace_job_status(&mut self, job_name: impl Into<String>, status: JobStatus) {
        self.status.job_statuses.insert(job_name.into(), status);
    }
}
