//! Provisioning of event secrets and announcement of work messages.

use crate::event::domain::{Event, EventId};
use crate::messaging::{
    domain::{Message, QueueName},
    ports::MessageBroker,
    services::Producer,
};
use crate::project::domain::{JobsSpec, LogLevel, Project, WorkerGitConfig};
use crate::scheduler::{
    domain::{
        COMPONENT_LABEL, ClusterResource, EVENT_DOCUMENT_KEY, EVENT_LABEL, GIT_SSH_CERT,
        GIT_SSH_KEY, LabelSelector, PROJECT_LABEL, PROJECT_SECRETS_NAME, ResourceKind,
        WORKER_DOCUMENT_KEY, WORKER_MESSAGE_DELAY, WorkerMessage, event_secret_name,
        worker_secret_name,
    },
    ports::{ClusterApi, ClusterError, EventsScheduler, SchedulerError, SchedulerResult},
};
use async_trait::async_trait;
use mockable::Clock;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Component label value of the event description secret.
const EVENT_COMPONENT: &str = "event";

/// Component label value of the worker configuration secret.
const WORKER_CONFIG_COMPONENT: &str = "worker-config";

/// Kinds removed by label when an event is canceled or deleted.
const EXECUTION_KINDS: [ResourceKind; 3] = [
    ResourceKind::Pod,
    ResourceKind::PersistentVolumeClaim,
    ResourceKind::ConfigMap,
];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkerProject<'a> {
    id: &'a str,
    namespace: &'a str,
    secrets: &'a BTreeMap<String, String>,
}

/// Configuration handed to the worker process.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkerDocument<'a> {
    event: EventId,
    project: WorkerProject<'a>,
    git: &'a WorkerGitConfig,
    jobs: &'a JobsSpec,
    log_level: LogLevel,
    config_files_directory: &'a str,
    default_config_files: &'a BTreeMap<String, String>,
}

/// Events scheduler that writes event secrets through a [`ClusterApi`] and
/// announces events on the project's work queue.
pub struct ClusterEventsScheduler<A, B, C>
where
    A: ClusterApi,
    B: MessageBroker + ?Sized,
    C: Clock + Send + Sync,
{
    cluster: Arc<A>,
    broker: Arc<B>,
    clock: Arc<C>,
}

impl<A, B, C> ClusterEventsScheduler<A, B, C>
where
    A: ClusterApi,
    B: MessageBroker + ?Sized,
    C: Clock + Send + Sync,
{
    /// Creates a scheduler over `cluster`, publishing through `broker`.
    #[must_use]
    pub const fn new(cluster: Arc<A>, broker: Arc<B>, clock: Arc<C>) -> Self {
        Self {
            cluster,
            broker,
            clock,
        }
    }

    async fn announce(&self, event: &Event) -> SchedulerResult<()> {
        let queue = QueueName::new(event.project_id().as_str())?;
        let body = WorkerMessage::new(event.id())
            .to_body()
            .map_err(|err| SchedulerError::codec("work message", err))?;
        let message = Message::delayed(body, WORKER_MESSAGE_DELAY, &*self.clock)?;
        Producer::new(queue, Arc::clone(&self.broker))
            .publish(&message)
            .await?;
        Ok(())
    }

    async fn remove(&self, event: &Event, keep_description: bool) -> SchedulerResult<()> {
        let namespace = event
            .namespace()
            .ok_or(SchedulerError::EventUnscheduled(event.id()))?;
        let selector = LabelSelector::new().equals(EVENT_LABEL, event.id().to_string());
        for kind in EXECUTION_KINDS {
            let removed = self
                .cluster
                .delete_matching(kind, namespace, &selector)
                .await?;
            debug!(event_id = %event.id(), %kind, removed, "removed event resources");
        }
        let secrets = if keep_description {
            selector.not_equals(COMPONENT_LABEL, EVENT_COMPONENT)
        } else {
            selector
        };
        let removed = self
            .cluster
            .delete_matching(ResourceKind::Secret, namespace, &secrets)
            .await?;
        debug!(event_id = %event.id(), removed, "removed event secrets");
        Ok(())
    }
}

fn labelled(
    kind: ResourceKind,
    namespace: &str,
    name: String,
    component: &str,
    event: &Event,
) -> ClusterResource {
    ClusterResource::new(kind, namespace, name)
        .with_label(COMPONENT_LABEL, component)
        .with_label(PROJECT_LABEL, event.project_id().as_str())
        .with_label(EVENT_LABEL, event.id().to_string())
}

#[async_trait]
impl<A, B, C> EventsScheduler for ClusterEventsScheduler<A, B, C>
where
    A: ClusterApi,
    B: MessageBroker + ?Sized,
    C: Clock + Send + Sync,
{
    async fn create(&self, project: &Project, event: &Event) -> SchedulerResult<Event> {
        let namespace = project
            .namespace()
            .ok_or_else(|| SchedulerError::ProjectUnscheduled(project.id().clone()))?;
        let scheduled = event.clone().with_namespace(namespace);
        let secrets = self
            .cluster
            .get(ResourceKind::Secret, namespace, PROJECT_SECRETS_NAME)
            .await?
            .ok_or_else(|| {
                ClusterError::not_found(ResourceKind::Secret, namespace, PROJECT_SECRETS_NAME)
            })?;

        let event_document = serde_json::to_string_pretty(&scheduled)
            .map_err(|err| SchedulerError::codec("event document", err))?;
        self.cluster
            .create(
                &labelled(
                    ResourceKind::Secret,
                    namespace,
                    event_secret_name(event.id()),
                    EVENT_COMPONENT,
                    &scheduled,
                )
                .with_data(EVENT_DOCUMENT_KEY, event_document)
                .with_spec(json!({ "type": "brignext.io/event" })),
            )
            .await?;

        let worker = scheduled.worker();
        let worker_document = serde_json::to_string_pretty(&WorkerDocument {
            event: scheduled.id(),
            project: WorkerProject {
                id: project.id().as_str(),
                namespace,
                secrets: secrets.data(),
            },
            git: &worker.git,
            jobs: &worker.jobs,
            log_level: worker.log_level,
            config_files_directory: &worker.config_files_directory,
            default_config_files: &worker.default_config_files,
        })
        .map_err(|err| SchedulerError::codec("worker document", err))?;
        let mut worker_secret = labelled(
            ResourceKind::Secret,
            namespace,
            worker_secret_name(event.id()),
            WORKER_CONFIG_COMPONENT,
            &scheduled,
        )
        .with_data(WORKER_DOCUMENT_KEY, worker_document);
        for key in [GIT_SSH_KEY, GIT_SSH_CERT] {
            if let Some(value) = secrets.data().get(key) {
                worker_secret = worker_secret.with_data(key, value.as_str());
            }
        }
        self.cluster.create(&worker_secret).await?;

        self.announce(&scheduled).await?;
        info!(
            event_id = %scheduled.id(),
            project_id = %project.id(),
            namespace,
            "scheduled event"
        );
        Ok(scheduled)
    }

    async fn get(&self, project: &Project, id: EventId) -> SchedulerResult<Option<Event>> {
        let namespace = project
            .namespace()
            .ok_or_else(|| SchedulerError::ProjectUnscheduled(project.id().clone()))?;
        let Some(secret) = self
            .cluster
            .get(ResourceKind::Secret, namespace, &event_secret_name(id))
            .await?
        else {
            return Ok(None);
        };
        let document = secret
            .data()
            .get(EVENT_DOCUMENT_KEY)
            .map_or("", String::as_str);
        serde_json::from_str(document)
            .map(Some)
            .map_err(|err| SchedulerError::codec("event document", err))
    }

    async fn cancel(&self, event: &Event) -> SchedulerResult<()> {
        self.remove(event, true).await
    }

    async fn delete(&self, event: &Event) -> SchedulerResult<()> {
        self.remove(event, false).await
    }
}
