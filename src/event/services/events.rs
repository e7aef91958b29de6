//! Event orchestration across the store, the scheduler, and the log store.

use crate::error::ErrorKind;
use crate::event::{
    domain::{
        Event, EventDetails, EventDomainError, EventId, EventListFilter, JobStatus, LogEntry,
        LogSource, WorkerStatus,
    },
    ports::{EventStore, EventStoreError, LogStore, LogStoreError, LogStream, do_tx},
};
use crate::project::{
    domain::{Project, ProjectId, WorkerSpec},
    ports::{ProjectStore, ProjectStoreError},
};
use crate::saga::{CompensationError, Saga};
use crate::scheduler::ports::{EventsScheduler, SchedulerError};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Workspace size given to workers whose project does not set one.
pub const DEFAULT_WORKSPACE_SIZE: &str = "10Gi";

/// Git ref checked out when a clone URL names neither a commit nor a ref.
pub const DEFAULT_GIT_REF: &str = "master";

/// Config files directory used when the project does not set one.
pub const DEFAULT_CONFIG_FILES_DIRECTORY: &str = ".";

/// Request payload for creating events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateEventRequest {
    project_id: Option<ProjectId>,
    details: EventDetails,
}

impl CreateEventRequest {
    /// Creates a request that fans out to every subscribed project.
    #[must_use]
    pub const fn new(details: EventDetails) -> Self {
        Self {
            project_id: None,
            details,
        }
    }

    /// Targets a single project instead of fanning out.
    #[must_use]
    pub fn for_project(mut self, project_id: ProjectId) -> Self {
        self.project_id = Some(project_id);
        self
    }
}

/// Per-event results of a project-wide cancel or delete.
#[derive(Debug, Default)]
pub struct SweepOutcome {
    /// Events whose phase gate matched and whose resources were torn down.
    pub matched: Vec<EventId>,
    /// Events whose phase gate did not match.
    pub skipped: Vec<EventId>,
    /// Events the sweep failed on, with the failure.
    pub failed: Vec<(EventId, EventsServiceError)>,
}

/// Service-level errors for event operations.
#[derive(Debug, Error)]
pub enum EventsServiceError {
    /// The event does not exist.
    #[error("event {0} not found")]
    NotFound(EventId),

    /// The project does not exist.
    #[error("project {0} not found")]
    ProjectNotFound(ProjectId),

    /// The event has no job with this name.
    #[error("event {event} has no job named {job}")]
    JobNotFound {
        /// Event identifier.
        event: EventId,
        /// Requested job name.
        job: String,
    },

    /// Event input or a status update was rejected.
    #[error(transparent)]
    Domain(#[from] EventDomainError),

    /// A store operation on one event failed.
    #[error("failed to {operation} event {id}")]
    Store {
        /// What was being done.
        operation: &'static str,
        /// Event identifier.
        id: EventId,
        /// Store failure.
        #[source]
        source: EventStoreError,
    },

    /// A scheduler operation on one event failed.
    #[error("failed to {operation} event {id} in the scheduler")]
    Scheduler {
        /// What was being done.
        operation: &'static str,
        /// Event identifier.
        id: EventId,
        /// Scheduler failure.
        #[source]
        source: SchedulerError,
    },

    /// The log store failed.
    #[error("failed to read logs of event {id}")]
    Logs {
        /// Event identifier.
        id: EventId,
        /// Log store failure.
        #[source]
        source: LogStoreError,
    },

    /// Project lookup failed.
    #[error("failed to look up projects")]
    Projects(#[from] ProjectStoreError),

    /// Opening or committing a store transaction failed.
    #[error("event store transaction failed")]
    Transaction(#[from] EventStoreError),
}

impl EventsServiceError {
    /// Classifies the error for transport layers.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::ProjectNotFound(_) | Self::JobNotFound { .. } => {
                ErrorKind::NotFound
            }
            Self::Domain(EventDomainError::InvalidWorkerTransition { .. }) => ErrorKind::Conflict,
            Self::Domain(EventDomainError::EmptySource | EventDomainError::EmptyType) => {
                ErrorKind::BadRequest
            }
            Self::Store { source, .. } | Self::Transaction(source) => match source {
                EventStoreError::NotFound(_) => ErrorKind::NotFound,
                EventStoreError::Duplicate(_) | EventStoreError::InvalidTransition(_) => {
                    ErrorKind::Conflict
                }
                EventStoreError::TransactionFinished | EventStoreError::Persistence(_) => {
                    ErrorKind::Internal
                }
            },
            Self::Scheduler { .. } | Self::Logs { .. } | Self::Projects(_) => ErrorKind::Internal,
        }
    }

    fn store(operation: &'static str, id: EventId) -> impl FnOnce(EventStoreError) -> Self {
        move |source| match source {
            EventStoreError::NotFound(missing) => Self::NotFound(missing),
            other => Self::Store {
                operation,
                id,
                source: other,
            },
        }
    }

    fn scheduler(operation: &'static str, id: EventId) -> impl FnOnce(SchedulerError) -> Self {
        move |source| Self::Scheduler {
            operation,
            id,
            source,
        }
    }
}

/// Result type for event service operations.
pub type EventsServiceResult<T> = Result<T, EventsServiceError>;

/// Event orchestration service.
///
/// Creation provisions scheduler resources before the store write and
/// deletes them again when the write fails. Cancellation and deletion commit
/// the store's phase-gated transition and the scheduler teardown together,
/// and only tear down when the gate matched.
#[derive(Clone)]
pub struct EventsService<S, P, Sch, L, C>
where
    S: EventStore,
    P: ProjectStore,
    Sch: EventsScheduler,
    L: LogStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    projects: Arc<P>,
    scheduler: Arc<Sch>,
    logs: Arc<L>,
    clock: Arc<C>,
}

impl<S, P, Sch, L, C> EventsService<S, P, Sch, L, C>
where
    S: EventStore,
    P: ProjectStore,
    Sch: EventsScheduler,
    L: LogStore,
    C: Clock + Send + Sync,
{
    /// Creates a new events service.
    #[must_use]
    pub const fn new(
        store: Arc<S>,
        projects: Arc<P>,
        scheduler: Arc<Sch>,
        logs: Arc<L>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            store,
            projects,
            scheduler,
            logs,
            clock,
        }
    }

    /// Creates events.
    ///
    /// Without a target project, one event is created for every project
    /// subscribed to the event's source, type, and labels; the result is
    /// empty when none are. With a target project, exactly one event is
    /// created.
    ///
    /// # Errors
    ///
    /// Returns [`EventsServiceError::ProjectNotFound`] for an unknown target
    /// project, [`EventsServiceError::Domain`] for invalid details, and
    /// wrapped scheduler or store failures. Fan-out stops at the first
    /// failure.
    pub async fn create(&self, request: CreateEventRequest) -> EventsServiceResult<Vec<Event>> {
        let CreateEventRequest {
            project_id,
            details,
        } = request;
        details.validate()?;

        let Some(target) = project_id else {
            let subscribed = self
                .projects
                .list_subscribed(&details.source, &details.event_type, &details.labels)
                .await?;
            let mut created = Vec::with_capacity(subscribed.len());
            for project in &subscribed {
                created.push(self.create_for_project(project, details.clone()).await?);
            }
            return Ok(created);
        };

        let project = self
            .projects
            .find_by_id(&target)
            .await?
            .ok_or(EventsServiceError::ProjectNotFound(target))?;
        Ok(vec![self.create_for_project(&project, details).await?])
    }

    async fn create_for_project(
        &self,
        project: &Project,
        details: EventDetails,
    ) -> EventsServiceResult<Event> {
        let worker = resolve_worker(&project.spec().worker_template, &details);
        let event = Event::pending(project.id().clone(), details, worker, &*self.clock);
        let id = event.id();

        let mut saga = Saga::new(format!("create event {id}"));
        let scheduler = &self.scheduler;
        let scheduled = saga
            .step(
                "schedule event",
                async {
                    scheduler
                        .create(project, &event)
                        .await
                        .map_err(EventsServiceError::scheduler("schedule", id))
                },
                |scheduled: &Event| {
                    let target = scheduled.clone();
                    Box::pin(async move {
                        scheduler
                            .delete(&target)
                            .await
                            .map_err(CompensationError::from)
                    })
                },
            )
            .await?;
        saga.finish("store event", async {
            self.store
                .create(&scheduled)
                .await
                .map_err(EventsServiceError::store("store", id))
        })
        .await?;

        info!(event_id = %id, project_id = %project.id(), "created event");
        Ok(scheduled)
    }

    /// Returns one event.
    ///
    /// # Errors
    ///
    /// Returns [`EventsServiceError::NotFound`] when the event does not exist.
    pub async fn get(&self, id: EventId) -> EventsServiceResult<Event> {
        self.store
            .find_by_id(id)
            .await
            .map_err(EventsServiceError::store("load", id))?
            .ok_or(EventsServiceError::NotFound(id))
    }

    /// Returns events matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`EventsServiceError::Transaction`] when the store fails.
    pub async fn list(&self, filter: &EventListFilter) -> EventsServiceResult<Vec<Event>> {
        Ok(self.store.list(filter).await?)
    }

    /// Cancels one event. Returns whether the phase gate matched.
    ///
    /// Pending events are canceled; running events are aborted only when
    /// `cancel_running` is set. The scheduler tears down execution
    /// resources only when the gate matched, inside the same store
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns [`EventsServiceError::NotFound`] for an unknown event and
    /// wrapped store or scheduler failures; the store change is rolled back
    /// when the scheduler fails.
    pub async fn cancel(&self, id: EventId, cancel_running: bool) -> EventsServiceResult<bool> {
        let event = self.get(id).await?;
        let at = self.clock.utc();
        let scheduler = &self.scheduler;
        let target = &event;
        let matched = do_tx(&*self.store, move |tx| async move {
            let matched = tx
                .cancel(id, cancel_running, at)
                .await
                .map_err(EventsServiceError::store("cancel", id))?;
            if matched {
                scheduler
                    .cancel(target)
                    .await
                    .map_err(EventsServiceError::scheduler("cancel", id))?;
            }
            Ok::<bool, EventsServiceError>(matched)
        })
        .await?;
        info!(event_id = %id, cancel_running, matched, "cancel requested");
        Ok(matched)
    }

    /// Deletes one event. Returns whether the phase gate matched.
    ///
    /// Terminal events are always deletable; pending and running events
    /// only with the matching flag. The scheduler removes every resource of
    /// the event only when the gate matched.
    ///
    /// # Errors
    ///
    /// Returns [`EventsServiceError::NotFound`] for an unknown event and
    /// wrapped store or scheduler failures; the store change is rolled back
    /// when the scheduler fails.
    pub async fn delete(
        &self,
        id: EventId,
        delete_pending: bool,
        delete_running: bool,
    ) -> EventsServiceResult<bool> {
        let event = self.get(id).await?;
        let scheduler = &self.scheduler;
        let target = &event;
        let matched = do_tx(&*self.store, move |tx| async move {
            let matched = tx
                .delete(id, delete_pending, delete_running)
                .await
                .map_err(EventsServiceError::store("delete", id))?;
            if matched {
                scheduler
                    .delete(target)
                    .await
                    .map_err(EventsServiceError::scheduler("delete", id))?;
            }
            Ok::<bool, EventsServiceError>(matched)
        })
        .await?;
        info!(event_id = %id, delete_pending, delete_running, matched, "delete requested");
        Ok(matched)
    }

    /// Cancels every event of a project, one transaction per event.
    ///
    /// # Errors
    ///
    /// Returns [`EventsServiceError::ProjectNotFound`] for an unknown project
    /// or a store failure while listing. Per-event failures are reported in
    /// [`SweepOutcome::failed`].
    pub async fn cancel_by_project(
        &self,
        project_id: &ProjectId,
        cancel_running: bool,
    ) -> EventsServiceResult<SweepOutcome> {
        let mut outcome = SweepOutcome::default();
        for event in self.project_events(project_id).await? {
            let id = event.id();
            match self.cancel(id, cancel_running).await {
                Ok(true) => outcome.matched.push(id),
                Ok(false) => outcome.skipped.push(id),
                Err(err) => {
                    warn!(event_id = %id, error = %err, "failed to cancel event");
                    outcome.failed.push((id, err));
                }
            }
        }
        Ok(outcome)
    }

    /// Deletes every event of a project, one transaction per event.
    ///
    /// # Errors
    ///
    /// Returns [`EventsServiceError::ProjectNotFound`] for an unknown project
    /// or a store failure while listing. Per-event failures are reported in
    /// [`SweepOutcome::failed`].
    pub async fn delete_by_project(
        &self,
        project_id: &ProjectId,
        delete_pending: bool,
        delete_running: bool,
    ) -> EventsServiceResult<SweepOutcome> {
        let mut outcome = SweepOutcome::default();
        for event in self.project_events(project_id).await? {
            let id = event.id();
            match self.delete(id, delete_pending, delete_running).await {
                Ok(true) => outcome.matched.push(id),
                Ok(false) => outcome.skipped.push(id),
                Err(err) => {
                    warn!(event_id = %id, error = %err, "failed to delete event");
                    outcome.failed.push((id, err));
                }
            }
        }
        Ok(outcome)
    }

    async fn project_events(&self, project_id: &ProjectId) -> EventsServiceResult<Vec<Event>> {
        if self.projects.find_by_id(project_id).await?.is_none() {
            return Err(EventsServiceError::ProjectNotFound(project_id.clone()));
        }
        Ok(self.store.list_by_project(project_id).await?)
    }

    /// Replaces an event's worker status.
    ///
    /// # Errors
    ///
    /// Returns [`EventsServiceError::NotFound`] for an unknown event and a
    /// conflict-classified error when the phase change is not allowed.
    pub async fn update_worker_status(
        &self,
        id: EventId,
        status: &WorkerStatus,
    ) -> EventsServiceResult<()> {
        self.store
            .update_worker_status(id, status)
            .await
            .map_err(EventsServiceError::store("update worker status of", id))
    }

    /// Replaces the status of one of an event's jobs.
    ///
    /// # Errors
    ///
    /// Returns [`EventsServiceError::NotFound`] for an unknown event.
    pub async fn update_job_status(
        &self,
        id: EventId,
        job_name: &str,
        status: &JobStatus,
    ) -> EventsServiceResult<()> {
        self.store
            .update_job_status(id, job_name, status)
            .await
            .map_err(EventsServiceError::store("update job status of", id))
    }

    /// Returns the output written so far by one of the event's containers.
    ///
    /// # Errors
    ///
    /// Returns [`EventsServiceError::NotFound`] or
    /// [`EventsServiceError::JobNotFound`] when the event or job does not
    /// exist, and [`EventsServiceError::Logs`] when the log store fails.
    pub async fn get_logs(
        &self,
        id: EventId,
        source: &LogSource,
    ) -> EventsServiceResult<Vec<LogEntry>> {
        let event = self.log_target(id, source).await?;
        self.logs
            .get_logs(&event, source)
            .await
            .map_err(|err| EventsServiceError::Logs { id, source: err })
    }

    /// Streams output of one of the event's containers as it is written.
    ///
    /// # Errors
    ///
    /// Same as [`EventsService::get_logs`].
    pub async fn stream_logs(&self, id: EventId, source: &LogSource) -> EventsServiceResult<LogStream> {
        let event = self.log_target(id, source).await?;
        self.logs
            .stream_logs(&event, source)
            .await
            .map_err(|err| EventsServiceError::Logs { id, source: err })
    }

    async fn log_target(&self, id: EventId, source: &LogSource) -> EventsServiceResult<Event> {
        let event = self.get(id).await?;
        if let Some(job) = source.job_name()
            && !event.status().job_statuses.contains_key(job)
        {
            return Err(EventsServiceError::JobNotFound {
                event: id,
                job: job.to_owned(),
            });
        }
        Ok(event)
    }
}

/// Builds an event's worker from the project template and the event's git
/// overrides, filling defaults.
#[must_use]
pub fn resolve_worker(template: &WorkerSpec, details: &EventDetails) -> WorkerSpec {
    let mut worker = template.clone();
    let overrides = &details.git;
    if !overrides.clone_url.is_empty() {
        worker.git.clone_url.clone_from(&overrides.clone_url);
    }
    if !overrides.commit.is_empty() {
        worker.git.commit.clone_from(&overrides.commit);
    }
    if !overrides.r#ref.is_empty() {
        worker.git.r#ref.clone_from(&overrides.r#ref);
    }
    if worker.workspace_size.is_empty() {
        DEFAULT_WORKSPACE_SIZE.clone_into(&mut worker.workspace_size);
    }
    if !worker.git.clone_url.is_empty() && worker.git.commit.is_empty() && worker.git.r#ref.is_empty()
    {
        DEFAULT_GIT_REF.clone_into(&mut worker.git.r#ref);
    }
    if worker.config_files_directory.is_empty() {
        DEFAULT_CONFIG_FILES_DIRECTORY.clone_into(&mut worker.config_files_directory);
    }
    worker
}
