//! Store port for project persistence and subscription lookup.

use crate::project::domain::{EventLabels, Project, ProjectId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for project store operations.
pub type ProjectStoreResult<T> = Result<T, ProjectStoreError>;

/// Project persistence contract.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Stores a new project.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectStoreError::Duplicate`] when the identifier is taken.
    async fn create(&self, project: &Project) -> ProjectStoreResult<()>;

    /// Returns every project, ordered by identifier.
    async fn list(&self) -> ProjectStoreResult<Vec<Project>>;

    /// Returns the projects with a subscription matching the event
    /// attributes, ordered by identifier.
    async fn list_subscribed(
        &self,
        source: &str,
        event_type: &str,
        labels: &EventLabels,
    ) -> ProjectStoreResult<Vec<Project>>;

    /// Finds a project by identifier.
    ///
    /// Returns `None` when the project does not exist.
    async fn find_by_id(&self, id: &ProjectId) -> ProjectStoreResult<Option<Project>>;

    /// Removes a project.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectStoreError::NotFound`] when the project does not
    /// exist.
    async fn delete(&self, id: &ProjectId) -> ProjectStoreResult<()>;
}

/// Errors returned by project store implementations.
#[derive(Debug, Clone, Error)]
pub enum ProjectStoreError {
    /// A project with the same identifier already exists.
    #[error("duplicate project identifier: {0}")]
    Duplicate(ProjectId),

    /// The project was not found.
    #[error("project not found: {0}")]
    NotFound(ProjectId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl ProjectStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
