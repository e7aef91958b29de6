//! Project lifecycle and secret management.

use crate::error::ErrorKind;
use crate::project::{
    domain::{Project, ProjectId, ProjectSpec, Secret},
    ports::{ProjectStore, ProjectStoreError},
};
use crate::saga::{CompensationError, Saga};
use crate::scheduler::ports::{ProjectsScheduler, SchedulerError};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Request payload for creating a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateProjectRequest {
    id: ProjectId,
    spec: ProjectSpec,
    description: Option<String>,
}

impl CreateProjectRequest {
    /// Creates a request with the required fields.
    #[must_use]
    pub const fn new(id: ProjectId, spec: ProjectSpec) -> Self {
        Self {
            id,
            spec,
            description: None,
        }
    }

    /// Sets the project description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Service-level errors for project operations.
#[derive(Debug, Error)]
pub enum ProjectsServiceError {
    /// The project does not exist.
    #[error("project {0} not found")]
    NotFound(ProjectId),

    /// A project with this identifier already exists.
    #[error("project {0} already exists")]
    AlreadyExists(ProjectId),

    /// The project store failed.
    #[error(transparent)]
    Store(#[from] ProjectStoreError),

    /// A scheduler operation failed.
    #[error("failed to {operation} project {project} in the scheduler")]
    Scheduler {
        /// What was being done.
        operation: &'static str,
        /// Project identifier.
        project: ProjectId,
        /// Scheduler failure.
        #[source]
        source: SchedulerError,
    },
}

impl ProjectsServiceError {
    /// Classifies the error for transport layers.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::Store(ProjectStoreError::NotFound(_)) => ErrorKind::NotFound,
            Self::AlreadyExists(_) | Self::Store(ProjectStoreError::Duplicate(_)) => {
                ErrorKind::Conflict
            }
            Self::Store(ProjectStoreError::Persistence(_)) | Self::Scheduler { .. } => {
                ErrorKind::Internal
            }
        }
    }

    fn scheduler(operation: &'static str, project: &ProjectId) -> impl FnOnce(SchedulerError) -> Self {
        let id = project.clone();
        move |source| Self::Scheduler {
            operation,
            project: id,
            source,
        }
    }
}

/// Result type for project service operations.
pub type ProjectsServiceResult<T> = Result<T, ProjectsServiceError>;

/// Project orchestration service.
#[derive(Clone)]
pub struct ProjectsService<S, P, C>
where
    S: ProjectStore,
    P: ProjectsScheduler,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    scheduler: Arc<P>,
    clock: Arc<C>,
}

impl<S, P, C> ProjectsService<S, P, C>
where
    S: ProjectStore,
    P: ProjectsScheduler,
    C: Clock + Send + Sync,
{
    /// Creates a new projects service.
    #[must_use]
    pub const fn new(store: Arc<S>, scheduler: Arc<P>, clock: Arc<C>) -> Self {
        Self {
            store,
            scheduler,
            clock,
        }
    }

    /// Creates a project, provisioning its cluster resources first.
    ///
    /// When the store write fails the provisioned resources are deleted
    /// again.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectsServiceError::AlreadyExists`] for a taken identifier
    /// and wrapped scheduler or store failures.
    pub async fn create(&self, request: CreateProjectRequest) -> ProjectsServiceResult<Project> {
        let CreateProjectRequest {
            id,
            spec,
            description,
        } = request;
        if self.store.find_by_id(&id).await?.is_some() {
            return Err(ProjectsServiceError::AlreadyExists(id));
        }
        let mut project = Project::new(id, spec, &*self.clock);
        if let Some(text) = description {
            project = project.with_description(text);
        }

        let mut saga = Saga::new(format!("create project {}", project.id()));
        let scheduler = &self.scheduler;
        let scheduled = saga
            .step(
                "schedule project",
                async {
                    scheduler
                        .create(&project)
                        .await
                        .map_err(ProjectsServiceError::scheduler("schedule", project.id()))
                },
                |scheduled: &Project| {
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
        saga.finish("store project", async {
            self.store.create(&scheduled).await.map_err(|err| match err {
                ProjectStoreError::Duplicate(taken) => ProjectsServiceError::AlreadyExists(taken),
                other => ProjectsServiceError::Store(other),
            })
        })
        .await?;

        info!(project_id = %scheduled.id(), namespace = ?scheduled.namespace(), "created project");
        Ok(scheduled)
    }

    /// Returns one project.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectsServiceError::NotFound`] when the project does not
    /// exist.
    pub async fn get(&self, id: &ProjectId) -> ProjectsServiceResult<Project> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| ProjectsServiceError::NotFound(id.clone()))
    }

    /// Returns every project, ordered by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectsServiceError::Store`] when the store fails.
    pub async fn list(&self) -> ProjectsServiceResult<Vec<Project>> {
        Ok(self.store.list().await?)
    }

    /// Deletes a project record, then its cluster resources.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectsServiceError::NotFound`] for an unknown project and
    /// wrapped store or scheduler failures. A scheduler failure leaves the
    /// record deleted.
    pub async fn delete(&self, id: &ProjectId) -> ProjectsServiceResult<()> {
        let project = self.get(id).await?;
        self.store.delete(id).await?;
        self.scheduler
            .delete(&project)
            .await
            .map_err(ProjectsServiceError::scheduler("delete", id))?;
        info!(project_id = %id, "deleted project");
        Ok(())
    }

    /// Returns the project's secrets with their values redacted.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectsServiceError::NotFound`] for an unknown project and
    /// wrapped scheduler failures.
    pub async fn list_secrets(&self, id: &ProjectId) -> ProjectsServiceResult<Vec<Secret>> {
        let project = self.get(id).await?;
        let secrets = self
            .scheduler
            .list_secrets(&project)
            .await
            .map_err(ProjectsServiceError::scheduler("list secrets of", id))?;
        Ok(secrets.iter().map(Secret::redacted).collect())
    }

    /// Adds or overwrites a project secret.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectsServiceError::NotFound`] for an unknown project and
    /// wrapped scheduler failures.
    pub async fn set_secret(&self, id: &ProjectId, secret: &Secret) -> ProjectsServiceResult<()> {
        let project = self.get(id).await?;
        self.scheduler
            .set_secret(&project, secret)
            .await
            .map_err(ProjectsServiceError::scheduler("set a secret of", id))
    }

    /// Removes a project secret; absent keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectsServiceError::NotFound`] for an unknown project and
    /// wrapped scheduler failures.
    pub async fn unset_secret(&self, id: &ProjectId, key: &str) -> ProjectsServiceResult<()> {
        let project = self.get(id).await?;
        self.scheduler
            .unset_secret(&project, key)
            .await
            .map_err(ProjectsServiceError::scheduler("unset a secret of", id))
    }
}
