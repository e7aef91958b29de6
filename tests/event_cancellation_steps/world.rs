//! Shared world state for event cancellation BDD scenarios.

use std::sync::Arc;

use brignext::event::{
    adapters::memory::{InMemoryEventStore, InMemoryLogStore},
    domain::Event,
    services::{EventsService, EventsServiceError},
};
use brignext::messaging::adapters::memory::InMemoryBroker;
use brignext::project::{
    adapters::memory::InMemoryProjectStore, domain::Project, services::ProjectsService,
};
use brignext::scheduler::{
    adapters::memory::InMemoryCluster,
    services::{ClusterEventsScheduler, ClusterProjectsScheduler},
};
use mockable::DefaultClock;
use rstest::fixture;

/// Events service wired to in-memory adapters.
pub type TestEventsService = EventsService<
    InMemoryEventStore,
    InMemoryProjectStore,
    ClusterEventsScheduler<InMemoryCluster, InMemoryBroker, DefaultClock>,
    InMemoryLogStore,
    DefaultClock,
>;

/// Projects service wired to in-memory adapters.
pub type TestProjectsService =
    ProjectsService<InMemoryProjectStore, ClusterProjectsScheduler<InMemoryCluster>, DefaultClock>;

/// Scenario world for event cancellation behaviour tests.
pub struct CancellationWorld {
    pub cluster: Arc<InMemoryCluster>,
    pub events: TestEventsService,
    pub projects: TestProjectsService,
    pub project: Option<Project>,
    pub event: Option<Event>,
    pub last_cancel_result: Option<Result<bool, EventsServiceError>>,
}

impl CancellationWorld {
    /// Creates a world over empty in-memory adapters.
    #[must_use]
    pub fn new() -> Self {
        let cluster = Arc::new(InMemoryCluster::new());
        let broker = Arc::new(InMemoryBroker::new());
        let clock = Arc::new(DefaultClock);
        let store = Arc::new(InMemoryProjectStore::new());
        let events = EventsService::new(
            Arc::new(InMemoryEventStore::new()),
            Arc::clone(&store),
            Arc::new(ClusterEventsScheduler::new(
                Arc::clone(&cluster),
                broker,
                Arc::clone(&clock),
            )),
            Arc::new(InMemoryLogStore::new()),
            Arc::clone(&clock),
        );
        let projects = ProjectsService::new(
            store,
            Arc::new(ClusterProjectsScheduler::new(Arc::clone(&cluster))),
            clock,
        );

        Self {
            cluster,
            events,
            projects,
            project: None,
            event: None,
            last_cancel_result: None,
        }
    }

    /// Returns the event created by the background steps.
    ///
    /// # Errors
    ///
    /// Returns an error when no event has been created yet.
    pub fn event(&self) -> Result<&Event, eyre::Report> {
        self.event
            .as_ref()
            .ok_or_else(|| eyre::eyre!("missing event in scenario world"))
    }
}

impl Default for CancellationWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> CancellationWorld {
    CancellationWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
