//! Scheduler contracts consumed by the project and event services.

use crate::event::domain::{Event, EventId};
use crate::messaging::domain::MessagingDomainError;
use crate::messaging::services::ProducerError;
use crate::project::domain::{Project, ProjectId, Secret};
use crate::scheduler::ports::ClusterError;
use async_trait::async_trait;
use thiserror::Error;

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Provisions and tears down a project's cluster resources.
///
/// Each operation is a best-effort sequence: the first failure aborts it and
/// already-created resources are left for the caller to compensate.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProjectsScheduler: Send + Sync {
    /// Creates the project's namespace, RBAC and secret store, returning the
    /// project with its namespace recorded.
    async fn create(&self, project: &Project) -> SchedulerResult<Project>;

    /// Deletes the project's namespace and everything in it.
    async fn delete(&self, project: &Project) -> SchedulerResult<()>;

    /// Returns the project's secrets with their real values, ordered by key.
    async fn list_secrets(&self, project: &Project) -> SchedulerResult<Vec<Secret>>;

    /// Adds or overwrites one secret.
    async fn set_secret(&self, project: &Project, secret: &Secret) -> SchedulerResult<()>;

    /// Removes one secret. Absent keys are ignored.
    async fn unset_secret(&self, project: &Project, key: &str) -> SchedulerResult<()>;
}

/// Provisions an event's cluster resources and announces it to workers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventsScheduler: Send + Sync {
    /// Writes the event and worker secrets into the project namespace and
    /// publishes a delayed work message. Returns the event with its
    /// namespace recorded.
    async fn create(&self, project: &Project, event: &Event) -> SchedulerResult<Event>;

    /// Reads an event back from its description secret.
    async fn get(&self, project: &Project, id: EventId) -> SchedulerResult<Option<Event>>;

    /// Deletes the event's execution resources, keeping its description
    /// secret.
    async fn cancel(&self, event: &Event) -> SchedulerResult<()>;

    /// Deletes every cluster resource of the event.
    async fn delete(&self, event: &Event) -> SchedulerResult<()>;
}

/// Errors returned by schedulers.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The project has no namespace yet.
    #[error("project {0} has not been scheduled")]
    ProjectUnscheduled(ProjectId),

    /// The event has no namespace yet.
    #[error("event {0} has not been scheduled")]
    EventUnscheduled(EventId),

    /// A document could not be encoded into or decoded from a secret.
    #[error("failed to encode or decode {document}")]
    Codec {
        /// The document being converted.
        document: String,
        /// Serialization failure.
        #[source]
        source: serde_json::Error,
    },

    /// A cluster call failed.
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    /// The work message could not be built.
    #[error("failed to build the work message")]
    Message(#[from] MessagingDomainError),

    /// The work message could not be published.
    #[error(transparent)]
    Queue(#[from] ProducerError),
}

impl SchedulerError {
    /// Builds a [`SchedulerError::Codec`].
    pub fn codec(document: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Codec {
            document: document.into(),
            source,
        }
    }
}
