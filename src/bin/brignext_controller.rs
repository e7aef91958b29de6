//! Runs the BrigNext worker controller.
//!
//! Usage:
//!
//! ```text
//! brignext-controller
//! ```
//!
//! Configuration comes from the environment (see [`BrigNextConfig`]) and log
//! verbosity from `RUST_LOG`. The controller consumes every project's work
//! queue in Redis, reads projects and events from `PostgreSQL`, and runs
//! until interrupted with Ctrl-C.
//!
//! Cluster resources are tracked by the in-process cluster adapter. The
//! controller exits with an error as soon as it sees a project whose
//! namespace that adapter does not hold, rather than claiming work it could
//! never provision.

use brignext::config::BrigNextConfig;
use brignext::controller::{
    adapters::ServiceControllerApi,
    services::{Controller, WorkerManager},
};
use brignext::event::{
    adapters::{memory::InMemoryLogStore, postgres::PostgresEventStore},
    services::EventsService,
};
use brignext::messaging::adapters::RedisBroker;
use brignext::project::{adapters::postgres::PostgresProjectStore, services::ProjectsService};
use brignext::scheduler::{
    adapters::memory::InMemoryCluster,
    services::{ClusterEventsScheduler, ClusterProjectsScheduler},
};
use brignext::telemetry::init_tracing;
use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use mockable::DefaultClock;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    init_tracing();
    let config = BrigNextConfig::from_env()?;

    let pool = Pool::builder()
        .max_size(config.database.pool_size)
        .build(ConnectionManager::<PgConnection>::new(&config.database.url))?;
    let broker =
        Arc::new(RedisBroker::connect(&config.redis.url, config.redis.key_prefix.clone()).await?);
    // Only namespaces created through this process are known to the cluster.
    let cluster = Arc::new(InMemoryCluster::new());
    let clock = Arc::new(DefaultClock);

    let projects = Arc::new(PostgresProjectStore::new(pool.clone()));
    let events = Arc::new(EventsService::new(
        Arc::new(PostgresEventStore::new(pool)),
        Arc::clone(&projects),
        Arc::new(ClusterEventsScheduler::new(
            Arc::clone(&cluster),
            Arc::clone(&broker),
            Arc::clone(&clock),
        )),
        Arc::new(InMemoryLogStore::new()),
        Arc::clone(&clock),
    ));
    let projects_service = Arc::new(ProjectsService::new(
        projects,
        Arc::new(ClusterProjectsScheduler::new(Arc::clone(&cluster))),
        Arc::clone(&clock),
    ));
    let api = Arc::new(ServiceControllerApi::new(events, projects_service));
    let manager = Arc::new(WorkerManager::new(
        Arc::clone(&api),
        cluster,
        &config.controller,
    ));
    let controller = Controller::new(api, broker, manager, clock, &config.controller);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("interrupt received; shutting down"),
            Err(err) => error!(error = %err, "failed to listen for interrupts; shutting down"),
        }
        on_signal.cancel();
    });

    controller.run(&cancel).await?;
    Ok(())
}
