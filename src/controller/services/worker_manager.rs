//! Message handler that runs one worker per event.

use crate::config::ControllerConfig;
use crate::controller::{
    domain::{WorkerDefaults, worker_pod, workspace_claim},
    ports::{ControllerApi, ControllerApiError},
};
use crate::event::domain::{Event, EventId, WorkerPhase};
use crate::messaging::{
    domain::Message,
    services::{HandlerError, MessageHandler},
};
use crate::retry::{Failure, RetryError, manage_retries};
use crate::scheduler::{
    domain::{ClusterResource, ResourceKind, WorkerMessage},
    ports::{ClusterApi, ClusterError, ClusterResult},
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{AcquireError, Semaphore};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Attempts made to find an event before giving up on its message.
pub const DEFAULT_LOOKUP_ATTEMPTS: u8 = 5;

/// Upper bound on the wait between event lookups.
pub const DEFAULT_LOOKUP_MAX_BACKOFF: Duration = Duration::from_secs(10);

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Failures that leave a work message claimed.
#[derive(Debug, Error)]
pub enum WorkerManagerError {
    /// The message body is not a work message.
    #[error("malformed work message")]
    Decode(#[source] serde_json::Error),

    /// The event could not be fetched.
    #[error("failed to look up event {event}")]
    Lookup {
        /// The event being looked up.
        event: EventId,
        /// Retry outcome of the lookup.
        #[source]
        source: RetryError<ControllerApiError>,
    },

    /// The event could not be polled.
    #[error("failed to poll event {event}")]
    Poll {
        /// The event being polled.
        event: EventId,
        /// API failure.
        #[source]
        source: ControllerApiError,
    },

    /// The event has no namespace to run in.
    #[error("event {0} has not been scheduled")]
    Unscheduled(EventId),

    /// The capacity semaphore was closed.
    #[error("worker capacity is no longer available")]
    Capacity(#[from] AcquireError),

    /// A workspace claim or worker pod could not be created.
    #[error("failed to provision the worker of event {event}")]
    Provision {
        /// The event being provisioned.
        event: EventId,
        /// Cluster failure.
        #[source]
        source: ClusterError,
    },
}

/// Handles work messages: provisions workers for pending events and waits
/// for them to finish.
pub struct WorkerManager<A, K>
where
    A: ControllerApi + ?Sized,
    K: ClusterApi + ?Sized,
{
    api: Arc<A>,
    cluster: Arc<K>,
    capacity: Arc<Semaphore>,
    defaults: WorkerDefaults,
    poll_interval: Duration,
    lookup_attempts: u8,
    lookup_max_backoff: Duration,
}

impl<A, K> WorkerManager<A, K>
where
    A: ControllerApi + ?Sized,
    K: ClusterApi + ?Sized,
{
    /// Creates a manager allowing `config.max_concurrent_workers` workers at
    /// once.
    #[must_use]
    pub fn new(api: Arc<A>, cluster: Arc<K>, config: &ControllerConfig) -> Self {
        Self {
            api,
            cluster,
            capacity: Arc::new(Semaphore::new(config.max_concurrent_workers.max(1))),
            defaults: WorkerDefaults::from(config),
            poll_interval: config.status_poll_interval.max(MIN_POLL_INTERVAL),
            lookup_attempts: DEFAULT_LOOKUP_ATTEMPTS,
            lookup_max_backoff: DEFAULT_LOOKUP_MAX_BACKOFF,
        }
    }

    /// Overrides how persistently a missing event is looked up.
    #[must_use]
    pub const fn with_lookup_retries(mut self, attempts: u8, max_backoff: Duration) -> Self {
        self.lookup_attempts = attempts;
        self.lookup_max_backoff = max_backoff;
        self
    }

    /// Returns the number of workers that could start right now.
    #[must_use]
    pub fn available_capacity(&self) -> usize {
        self.capacity.available_permits()
    }

    /// Returns `true` when the cluster holds `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError`] when the cluster cannot be queried.
    pub async fn has_namespace(&self, namespace: &str) -> ClusterResult<bool> {
        let found = self
            .cluster
            .get(ResourceKind::Namespace, namespace, namespace)
            .await?;
        Ok(found.is_some())
    }

    /// Processes one work message for event `id`.
    ///
    /// Returns once the worker is in a terminal phase or `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerManagerError`] when the event lookup fails for a
    /// reason other than the event never appearing, or when provisioning
    /// or polling fails.
    pub async fn run_worker(
        &self,
        cancel: &CancellationToken,
        id: EventId,
    ) -> Result<(), WorkerManagerError> {
        let event = match self.lookup(cancel, id).await {
            Ok(event) => event,
            Err(WorkerManagerError::Lookup {
                source:
                    RetryError::Exhausted {
                        attempts,
                        source: ControllerApiError::EventNotFound(_),
                        ..
                    },
                ..
            }) => {
                warn!(event_id = %id, attempts, "event never appeared; dropping its work message");
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        let phase = event.worker_phase();
        if phase.is_terminal() {
            debug!(event_id = %id, %phase, "worker already finished; nothing to do");
            return Ok(());
        }

        // Running and unknown workers still occupy a slot while watched.
        let permit = tokio::select! {
            acquired = Arc::clone(&self.capacity).acquire_owned() => acquired?,
            () = cancel.cancelled() => return Ok(()),
        };
        if phase == WorkerPhase::Pending {
            self.provision(&event).await?;
        }

        let outcome = self.wait_for_completion(cancel, id).await;
        drop(permit);
        outcome
    }

    async fn lookup(
        &self,
        cancel: &CancellationToken,
        id: EventId,
    ) -> Result<Event, WorkerManagerError> {
        manage_retries(
            cancel,
            "look up event",
            self.lookup_attempts,
            self.lookup_max_backoff,
            || async move {
                self.api.get_event(id).await.map_err(|err| match err {
                    ControllerApiError::EventNotFound(_) => Failure::Retry(err),
                    ControllerApiError::Backend(_) => Failure::Abort(err),
                })
            },
        )
        .await
        .map_err(|source| WorkerManagerError::Lookup { event: id, source })
    }

    async fn provision(&self, event: &Event) -> Result<(), WorkerManagerError> {
        let namespace = event
            .namespace()
            .ok_or(WorkerManagerError::Unscheduled(event.id()))?;
        self.create(event.id(), &workspace_claim(event, namespace, &self.defaults))
            .await?;
        self.create(event.id(), &worker_pod(event, namespace, &self.defaults))
            .await?;
        info!(
            event_id = %event.id(),
            project_id = %event.project_id(),
            namespace,
            "started worker"
        );
        Ok(())
    }

    async fn create(
        &self,
        event: EventId,
        resource: &ClusterResource,
    ) -> Result<(), WorkerManagerError> {
        match self.cluster.create(resource).await {
            Ok(()) => Ok(()),
            // Redelivered message for a worker that was already started.
            Err(ClusterError::AlreadyExists { kind, name, .. }) => {
                debug!(event_id = %event, %kind, name = %name, "worker resource already exists");
                Ok(())
            }
            Err(source) => Err(WorkerManagerError::Provision { event, source }),
        }
    }

    async fn wait_for_completion(
        &self,
        cancel: &CancellationToken,
        id: EventId,
    ) -> Result<(), WorkerManagerError> {
        let mut ticker = tokio::time::interval_at(
            Instant::now() + self.poll_interval,
            self.poll_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = cancel.cancelled() => return Ok(()),
            }
            match self.api.get_event(id).await {
                Ok(event) if event.worker_phase().is_terminal() => {
                    info!(event_id = %id, phase = %event.worker_phase(), "worker finished");
                    return Ok(());
                }
                Ok(_) => {}
                Err(ControllerApiError::EventNotFound(_)) => {
                    info!(event_id = %id, "event deleted while its worker ran");
                    return Ok(());
                }
                Err(source) => return Err(WorkerManagerError::Poll { event: id, source }),
            }
        }
    }
}

#[async_trait]
impl<A, K> MessageHandler for WorkerManager<A, K>
where
    A: ControllerApi + ?Sized,
    K: ClusterApi + ?Sized,
{
    async fn handle(
        &self,
        cancel: CancellationToken,
        message: Message,
    ) -> Result<(), HandlerError> {
        let work = WorkerMessage::from_body(message.body()).map_err(WorkerManagerError::Decode)?;
        self.run_worker(&cancel, work.event).await?;
        Ok(())
    }
}
