//! Reconciliation of per-project queue consumers.

use crate::config::ControllerConfig;
use crate::controller::{
    ports::{ControllerApi, ControllerApiError},
    services::WorkerManager,
};
use crate::messaging::{
    domain::{ConsumerOptions, MessagingDomainError, QueueName},
    ports::MessageBroker,
    services::{Consumer, ConsumerError, MessageHandler},
};
use crate::project::domain::{Project, ProjectId};
use crate::scheduler::ports::{ClusterApi, ClusterError};
use mockable::Clock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Receivers per project consumer.
pub const CONSUMER_RECEIVERS: u8 = 1;

/// Handlers per project consumer.
pub const CONSUMER_HANDLERS: u8 = 2;

/// Result type for [`Controller::run`].
pub type ControllerResult<T> = Result<T, ControllerError>;

/// Fatal controller failures.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Projects could not be listed.
    #[error("failed to list projects")]
    Projects(#[source] ControllerApiError),

    /// A project identifier is not a valid queue name.
    #[error("project {project} has no valid work queue")]
    Queue {
        /// The project.
        project: ProjectId,
        /// Validation failure.
        #[source]
        source: MessagingDomainError,
    },

    /// A project has no namespace assigned.
    #[error("project {0} has not been scheduled")]
    Unscheduled(ProjectId),

    /// The cluster does not hold a project's namespace, so none of its
    /// workers could be provisioned.
    #[error("namespace {namespace} of project {project} does not exist in the cluster")]
    NamespaceMissing {
        /// The project.
        project: ProjectId,
        /// The namespace the project was assigned.
        namespace: String,
    },

    /// The cluster could not be asked for a project's namespace.
    #[error("failed to check the namespace of project {project}")]
    Cluster {
        /// The project.
        project: ProjectId,
        /// Cluster failure.
        #[source]
        source: ClusterError,
    },

    /// A project's consumer stopped with a fatal error.
    #[error("work queue consumer of project {project} failed")]
    Consumer {
        /// The project.
        project: ProjectId,
        /// Consumer failure.
        #[source]
        source: ConsumerError,
    },
}

/// Consumer options used for every project queue.
///
/// Each project queue has exactly one consumer, so it runs as a lone
/// consumer and reclaims every claimed message when it starts.
#[must_use]
pub fn project_consumer_options() -> ConsumerOptions {
    ConsumerOptions::new()
        .with_lone_consumer(true)
        .with_concurrent_receivers(CONSUMER_RECEIVERS)
        .with_concurrent_handlers(CONSUMER_HANDLERS)
}

/// Keeps one work queue consumer running per project.
pub struct Controller<A, B, K, C>
where
    A: ControllerApi + ?Sized + 'static,
    B: MessageBroker + ?Sized + 'static,
    K: ClusterApi + ?Sized + 'static,
    C: Clock + Send + Sync + 'static,
{
    api: Arc<A>,
    broker: Arc<B>,
    manager: Arc<WorkerManager<A, K>>,
    clock: Arc<C>,
    sync_interval: Duration,
    options: ConsumerOptions,
}

impl<A, B, K, C> Controller<A, B, K, C>
where
    A: ControllerApi + ?Sized + 'static,
    B: MessageBroker + ?Sized + 'static,
    K: ClusterApi + ?Sized + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a controller whose consumers hand messages to `manager`.
    #[must_use]
    pub fn new(
        api: Arc<A>,
        broker: Arc<B>,
        manager: Arc<WorkerManager<A, K>>,
        clock: Arc<C>,
        config: &ControllerConfig,
    ) -> Self {
        Self {
            api,
            broker,
            manager,
            clock,
            sync_interval: config
                .project_sync_interval
                .max(Duration::from_millis(1)),
            options: project_consumer_options(),
        }
    }

    /// Replaces the options given to project consumers.
    #[must_use]
    pub const fn with_consumer_options(mut self, options: ConsumerOptions) -> Self {
        self.options = options;
        self
    }

    /// Reconciles consumers until `cancel` fires or a consumer fails.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError`] when projects cannot be listed, when a
    /// project's namespace is absent from the cluster, or when any project
    /// consumer stops with a fatal error.
    pub async fn run(&self, cancel: &CancellationToken) -> ControllerResult<()> {
        let (fatal_tx, mut fatal_rx) = mpsc::channel(1);
        let mut consumers = Consumers {
            running: HashMap::new(),
            tasks: JoinSet::new(),
            fatal: fatal_tx,
        };
        let mut ticker = tokio::time::interval(self.sync_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("controller started");

        let outcome = loop {
            tokio::select! {
                () = cancel.cancelled() => break Ok(()),
                Some(err) = fatal_rx.recv() => break Err(err),
                _ = ticker.tick() => {
                    if let Err(err) = self.reconcile(cancel, &mut consumers).await {
                        break Err(err);
                    }
                }
            }
        };

        consumers.stop_all().await;
        match &outcome {
            Ok(()) => info!("controller stopped"),
            Err(err) => error!(error = %err, "controller failed"),
        }
        outcome
    }

    async fn reconcile(
        &self,
        cancel: &CancellationToken,
        consumers: &mut Consumers,
    ) -> ControllerResult<()> {
        while consumers.tasks.try_join_next().is_some() {}
        let projects = self
            .api
            .list_projects()
            .await
            .map_err(ControllerError::Projects)?;
        let current: BTreeSet<ProjectId> =
            projects.iter().map(|project| project.id().clone()).collect();

        consumers.running.retain(|project, token| {
            let keep = current.contains(project);
            if !keep {
                debug!(project_id = %project, "stopping work queue consumer");
                token.cancel();
            }
            keep
        });

        for project in &projects {
            let id = project.id();
            if consumers.running.contains_key(id) {
                continue;
            }
            let queue = QueueName::new(id.as_str()).map_err(|source| ControllerError::Queue {
                project: id.clone(),
                source,
            })?;
            self.ensure_servable(project).await?;
            debug!(project_id = %id, "starting work queue consumer");
            let consumer = Consumer::new(
                queue,
                Arc::clone(&self.broker),
                Arc::clone(&self.manager),
                Arc::clone(&self.clock),
                &self.options,
            );
            let token = cancel.child_token();
            consumers.spawn(id.clone(), consumer, token);
        }
        Ok(())
    }

    /// Fails unless the cluster holds the project's namespace.
    async fn ensure_servable(&self, project: &Project) -> ControllerResult<()> {
        let id = project.id();
        let namespace = project
            .namespace()
            .ok_or_else(|| ControllerError::Unscheduled(id.clone()))?;
        let exists = self
            .manager
            .has_namespace(namespace)
            .await
            .map_err(|source| ControllerError::Cluster {
                project: id.clone(),
                source,
            })?;
        if exists {
            Ok(())
        } else {
            Err(ControllerError::NamespaceMissing {
                project: id.clone(),
                namespace: namespace.to_owned(),
            })
        }
    }
}

struct Consumers {
    running: HashMap<ProjectId, CancellationToken>,
    tasks: JoinSet<()>,
    fatal: mpsc::Sender<ControllerError>,
}

impl Consumers {
    fn spawn<B, H, C>(
        &mut self,
        project: ProjectId,
        consumer: Consumer<B, H, C>,
        token: CancellationToken,
    ) where
        B: MessageBroker + ?Sized + 'static,
        H: MessageHandler + ?Sized + 'static,
        C: Clock + Send + Sync + 'static,
    {
        let fatal = self.fatal.clone();
        let task_token = token.clone();
        let task_project = project.clone();
        self.tasks.spawn(async move {
            if let Err(source) = consumer.run(&task_token).await {
                let err = ControllerError::Consumer {
                    project: task_project,
                    source,
                };
                if let Err(unsent) = fatal.try_send(err) {
                    debug!(error = %unsent, "fatal error already reported");
                }
            }
        });
        self.running.insert(project, token);
    }

    async fn stop_all(&mut self) {
        for token in self.running.values() {
            token.cancel();
        }
        self.running.clear();
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(err) = joined
                && err.is_panic()
            {
                error!("work queue consumer panicked");
            }
        }
    }
}
