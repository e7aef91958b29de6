//! Read-only view of projects and events used by the controller.

use crate::event::domain::{Event, EventId};
use crate::project::domain::Project;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for controller API calls.
pub type ControllerApiResult<T> = Result<T, ControllerApiError>;

/// Queries the controller makes against the rest of the system.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ControllerApi: Send + Sync {
    /// Lists every project.
    async fn list_projects(&self) -> ControllerApiResult<Vec<Project>>;

    /// Fetches the current state of an event.
    async fn get_event(&self, id: EventId) -> ControllerApiResult<Event>;
}

/// Errors returned by [`ControllerApi`] implementations.
#[derive(Debug, Clone, Error)]
pub enum ControllerApiError {
    /// The event does not exist (yet, or any more).
    #[error("event {0} not found")]
    EventNotFound(EventId),

    /// Any other failure.
    #[error("controller API error: {0}")]
    Backend(Arc<dyn std::error::Error + Send + Sync>),
}

impl ControllerApiError {
    /// Wraps a backend error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Arc::new(err))
    }
}
