//! Store port for events, with phase-gated conditional updates.
//!
//! Conditional operations report whether the phase gate was satisfied as a
//! `bool` ("matched"). An unmatched gate is not an error.

use crate::event::domain::{
    Event, EventDomainError, EventId, EventListFilter, JobStatus, WorkerStatus,
};
use crate::project::domain::ProjectId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Result type for event store operations.
pub type EventStoreResult<T> = Result<T, EventStoreError>;

/// Event persistence contract.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Stores a new event.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Duplicate`] when the identifier is taken.
    async fn create(&self, event: &Event) -> EventStoreResult<()>;

    /// Finds an event by identifier.
    ///
    /// Returns `None` when the event does not exist.
    async fn find_by_id(&self, id: EventId) -> EventStoreResult<Option<Event>>;

    /// Returns events satisfying `filter`, newest first.
    async fn list(&self, filter: &EventListFilter) -> EventStoreResult<Vec<Event>>;

    /// Returns every event of a project, newest first.
    async fn list_by_project(&self, project_id: &ProjectId) -> EventStoreResult<Vec<Event>> {
        self.list(&EventListFilter::new().with_project(project_id.clone()))
            .await
    }

    /// Moves a pending event to canceled, or (with `cancel_running`) a
    /// running event to aborted. Returns whether a transition happened.
    async fn cancel(
        &self,
        id: EventId,
        cancel_running: bool,
        at: DateTime<Utc>,
    ) -> EventStoreResult<bool>;

    /// Removes a terminal event, or a pending/running one when the matching
    /// flag allows. Returns whether the event was removed.
    async fn delete(
        &self,
        id: EventId,
        delete_pending: bool,
        delete_running: bool,
    ) -> EventStoreResult<bool>;

    /// Replaces the worker status.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::NotFound`] when the event does not exist and
    /// [`EventStoreError::InvalidTransition`] when the phase change is not
    /// allowed.
    async fn update_worker_status(
        &self,
        id: EventId,
        status: &WorkerStatus,
    ) -> EventStoreResult<()>;

    /// Replaces the status of one job, adding the job if it is new.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::NotFound`] when the event does not exist.
    async fn update_job_status(
        &self,
        id: EventId,
        job_name: &str,
        status: &JobStatus,
    ) -> EventStoreResult<()>;

    /// Opens a transaction.
    ///
    /// Conditional updates made through the transaction become durable on
    /// [`EventTransaction::commit`] and are undone by
    /// [`EventTransaction::rollback`].
    async fn begin(&self) -> EventStoreResult<Arc<dyn EventTransaction>>;
}

/// Conditional updates composed atomically.
#[async_trait]
pub trait EventTransaction: Send + Sync {
    /// Transactional form of [`EventStore::cancel`].
    async fn cancel(
        &self,
        id: EventId,
        cancel_running: bool,
        at: DateTime<Utc>,
    ) -> EventStoreResult<bool>;

    /// Transactional form of [`EventStore::delete`].
    async fn delete(
        &self,
        id: EventId,
        delete_pending: bool,
        delete_running: bool,
    ) -> EventStoreResult<bool>;

    /// Makes the transaction's changes durable.
    async fn commit(&self) -> EventStoreResult<()>;

    /// Discards the transaction's changes.
    async fn rollback(&self) -> EventStoreResult<()>;
}

/// Runs `operation` inside a store transaction.
///
/// Commits when `operation` succeeds and rolls back when it fails. A failed
/// rollback is logged; the operation's error is returned either way.
///
/// # Errors
///
/// Returns the operation's error, or the store error raised while opening or
/// committing the transaction.
pub async fn do_tx<S, T, E, F, Fut>(store: &S, operation: F) -> Result<T, E>
where
    S: EventStore + ?Sized,
    E: From<EventStoreError>,
    F: FnOnce(Arc<dyn EventTransaction>) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let tx = store.begin().await?;
    match operation(Arc::clone(&tx)).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "failed to roll back event transaction");
            }
            Err(err)
        }
    }
}

/// Errors returned by event store implementations.
#[derive(Debug, Clone, Error)]
pub enum EventStoreError {
    /// An event with the same identifier already exists.
    #[error("duplicate event identifier: {0}")]
    Duplicate(EventId),

    /// The event was not found.
    #[error("event not found: {0}")]
    NotFound(EventId),

    /// A status update broke the worker phase state machine.
    #[error(transparent)]
    InvalidTransition(EventDomainError),

    /// The transaction was already committed or rolled back.
    #[error("transaction already finished")]
    TransactionFinished,

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl EventStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
