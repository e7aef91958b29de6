//! Shared wiring for in-memory integration tests.

use std::sync::Arc;

use brignext::event::{
    adapters::memory::{InMemoryEventStore, InMemoryLogStore},
    services::EventsService,
};
use brignext::messaging::adapters::memory::InMemoryBroker;
use brignext::project::{
    adapters::memory::InMemoryProjectStore,
    domain::{EventSubscription, Project, ProjectId, ProjectSpec},
    services::{CreateProjectRequest, ProjectsService},
};
use brignext::scheduler::{
    adapters::memory::InMemoryCluster,
    services::{ClusterEventsScheduler, ClusterProjectsScheduler},
};
use mockable::DefaultClock;
use rstest::fixture;

/// Events service over in-memory adapters.
pub type TestEventsService = EventsService<
    InMemoryEventStore,
    InMemoryProjectStore,
    ClusterEventsScheduler<InMemoryCluster, InMemoryBroker, DefaultClock>,
    InMemoryLogStore,
    DefaultClock,
>;

/// Projects service over in-memory adapters.
pub type TestProjectsService =
    ProjectsService<InMemoryProjectStore, ClusterProjectsScheduler<InMemoryCluster>, DefaultClock>;

/// Every in-memory adapter plus the two services built on them.
pub struct Stack {
    pub cluster: Arc<InMemoryCluster>,
    pub broker: Arc<InMemoryBroker>,
    pub logs: Arc<InMemoryLogStore>,
    pub events: Arc<TestEventsService>,
    pub projects: Arc<TestProjectsService>,
}

impl Stack {
    /// Creates a project subscribed to `github` pushes.
    pub async fn github_project(&self, id: &str) -> Project {
        let spec = ProjectSpec {
            event_subscriptions: vec![EventSubscription::new("github", ["push"])],
            ..ProjectSpec::default()
        };
        self.projects
            .create(CreateProjectRequest::new(
                ProjectId::new(id).expect("valid project id"),
                spec,
            ))
            .await
            .expect("project creation should succeed")
    }
}

/// Provides a fresh stack for each test.
#[fixture]
pub fn stack() -> Stack {
    let cluster = Arc::new(InMemoryCluster::new());
    let broker = Arc::new(InMemoryBroker::new());
    let logs = Arc::new(InMemoryLogStore::new());
    let clock = Arc::new(DefaultClock);
    let store = Arc::new(InMemoryProjectStore::new());

    let events = Arc::new(EventsService::new(
        Arc::new(InMemoryEventStore::new()),
        Arc::clone(&store),
        Arc::new(ClusterEventsScheduler::new(
            Arc::clone(&cluster),
            Arc::clone(&broker),
            Arc::clone(&clock),
        )),
        Arc::clone(&logs),
        Arc::clone(&clock),
    ));
    let projects = Arc::new(ProjectsService::new(
        store,
        Arc::new(ClusterProjectsScheduler::new(Arc::clone(&cluster))),
        clock,
    ));

    Stack {
        cluster,
        broker,
        logs,
        events,
        projects,
    }
}
