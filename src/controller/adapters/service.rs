//! Controller API answered in-process by the events and projects services.

use crate::controller::ports::{ControllerApi, ControllerApiError, ControllerApiResult};
use crate::error::ErrorKind;
use crate::event::{
    domain::{Event, EventId},
    ports::{EventStore, LogStore},
    services::EventsService,
};
use crate::project::{domain::Project, ports::ProjectStore, services::ProjectsService};
use crate::scheduler::ports::{EventsScheduler, ProjectsScheduler};
use async_trait::async_trait;
use mockable::Clock;
use std::sync::Arc;

/// [`ControllerApi`] backed by [`EventsService`] and [`ProjectsService`].
pub struct ServiceControllerApi<S, P, ES, L, PS, C>
where
    S: EventStore,
    P: ProjectStore,
    ES: EventsScheduler,
    L: LogStore,
    PS: ProjectsScheduler,
    C: Clock + Send + Sync,
{
    events: Arc<EventsService<S, P, ES, L, C>>,
    projects: Arc<ProjectsService<P, PS, C>>,
}

impl<S, P, ES, L, PS, C> ServiceControllerApi<S, P, ES, L, PS, C>
where
    S: EventStore,
    P: ProjectStore,
    ES: EventsScheduler,
    L: LogStore,
    PS: ProjectsScheduler,
    C: Clock + Send + Sync,
{
    /// Creates an API over the given services.
    #[must_use]
    pub const fn new(
        events: Arc<EventsService<S, P, ES, L, C>>,
        projects: Arc<ProjectsService<P, PS, C>>,
    ) -> Self {
        Self { events, projects }
    }
}

#[async_trait]
impl<S, P, ES, L, PS, C> ControllerApi for ServiceControllerApi<S, P, ES, L, PS, C>
where
    S: EventStore,
    P: ProjectStore,
    ES: EventsScheduler,
    L: LogStore,
    PS: ProjectsScheduler,
    C: Clock + Send + Sync,
{
    async fn list_projects(&self) -> ControllerApiResult<Vec<Project>> {
        self.projects
            .list()
            .await
            .map_err(ControllerApiError::backend)
    }

    async fn get_event(&self, id: EventId) -> ControllerApiResult<Event> {
        self.events.get(id).await.map_err(|err| match err.kind() {
            ErrorKind::NotFound => ControllerApiError::EventNotFound(id),
            _ => ControllerApiError::backend(err),
        })
    }
}
