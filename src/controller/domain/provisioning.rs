//! Builders for the workspace claim and worker pod of an event.

use crate::config::ControllerConfig;
use crate::event::domain::{Event, EventId};
use crate::scheduler::domain::{
    COMPONENT_LABEL, ClusterResource, EVENT_LABEL, GIT_SSH_CERT, GIT_SSH_KEY, PROJECT_LABEL,
    ResourceKind, WORKERS_PRINCIPAL, event_secret_name, worker_secret_name,
};
use serde_json::{Value, json};

/// Component label of workspace claims.
pub const WORKSPACE_COMPONENT: &str = "workspace";
/// Component label of worker pods.
pub const WORKER_COMPONENT: &str = "worker";
/// Image of the init container that checks out the project's repository.
pub const GIT_SIDECAR_IMAGE: &str = "brigadecore/git-sidecar:v1.4.0";
/// Where the event secret is mounted in the worker container.
pub const EVENT_MOUNT_PATH: &str = "/var/event";
/// Where the workspace claim is mounted in the worker container.
pub const WORKSPACE_MOUNT_PATH: &str = "/var/workspace";
/// Where the repository checkout lives.
pub const VCS_MOUNT_PATH: &str = "/var/vcs";

const EVENT_VOLUME: &str = "event";
const WORKSPACE_VOLUME: &str = "workspace";
const VCS_VOLUME: &str = "vcs";

/// Fallbacks applied when a worker spec leaves a setting empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerDefaults {
    /// Worker image.
    pub image: String,
    /// Worker image pull policy.
    pub image_pull_policy: String,
    /// Storage class of workspace claims.
    pub storage_class: String,
}

impl From<&ControllerConfig> for WorkerDefaults {
    fn from(config: &ControllerConfig) -> Self {
        Self {
            image: config.default_worker_image.clone(),
            image_pull_policy: config.default_worker_image_pull_policy.clone(),
            storage_class: config.workspace_storage_class.clone(),
        }
    }
}

/// Returns the name of the workspace claim of event `id`.
#[must_use]
pub fn workspace_claim_name(id: EventId) -> String {
    format!("workspace-{id}")
}

/// Returns the name of the worker pod of event `id`.
#[must_use]
pub fn worker_pod_name(id: EventId) -> String {
    format!("worker-{id}")
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

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() { fallback } else { value }
}

/// Builds the workspace claim for a scheduled event.
#[must_use]
pub fn workspace_claim(
    event: &Event,
    namespace: &str,
    defaults: &WorkerDefaults,
) -> ClusterResource {
    labelled(
        ResourceKind::PersistentVolumeClaim,
        namespace,
        workspace_claim_name(event.id()),
        WORKSPACE_COMPONENT,
        event,
    )
    .with_spec(json!({
        "storageClassName": defaults.storage_class,
        "accessModes": ["ReadWriteMany"],
        "resources": { "requests": { "storage": event.worker().workspace_size } },
    }))
}

fn secret_env(name: &str, secret: &str, key: &str) -> Value {
    json!({
        "name": name,
        "valueFrom": { "secretKeyRef": { "name": secret, "key": key, "optional": true } },
    })
}

fn vcs_init_container(event: &Event) -> Value {
    let git = &event.worker().git;
    let worker_secret = worker_secret_name(event.id());
    json!({
        "name": VCS_VOLUME,
        "image": GIT_SIDECAR_IMAGE,
        "imagePullPolicy": "Always",
        "volumeMounts": [{ "name": VCS_VOLUME, "mountPath": VCS_MOUNT_PATH }],
        "env": [
            { "name": "BRIGADE_REMOTE_URL", "value": git.clone_url },
            { "name": "BRIGADE_COMMIT_ID", "value": git.commit },
            { "name": "BRIGADE_COMMIT_REF", "value": git.r#ref },
            secret_env("BRIGADE_REPO_KEY", &worker_secret, GIT_SSH_KEY),
            secret_env("BRIGADE_REPO_SSH_CERT", &worker_secret, GIT_SSH_CERT),
            { "name": "BRIGADE_SUBMODULES", "value": git.init_submodules.to_string() },
            { "name": "BRIGADE_WORKSPACE", "value": VCS_MOUNT_PATH },
        ],
    })
}

/// Builds the worker pod for a scheduled event.
///
/// The repository checkout init container and its volume are only added
/// when the worker spec names a clone URL.
#[must_use]
pub fn worker_pod(event: &Event, namespace: &str, defaults: &WorkerDefaults) -> ClusterResource {
    let worker = event.worker();
    let container = &worker.container;
    let mut volumes = vec![
        json!({ "name": EVENT_VOLUME, "secret": { "secretName": event_secret_name(event.id()) } }),
        json!({
            "name": WORKSPACE_VOLUME,
            "persistentVolumeClaim": { "claimName": workspace_claim_name(event.id()) },
        }),
    ];
    let mut mounts = vec![
        json!({ "name": EVENT_VOLUME, "mountPath": EVENT_MOUNT_PATH, "readOnly": true }),
        json!({ "name": WORKSPACE_VOLUME, "mountPath": WORKSPACE_MOUNT_PATH, "readOnly": true }),
    ];
    let mut init_containers = Vec::new();
    if !worker.git.clone_url.is_empty() {
        volumes.push(json!({ "name": VCS_VOLUME, "emptyDir": {} }));
        mounts.push(json!({ "name": VCS_VOLUME, "mountPath": VCS_MOUNT_PATH }));
        init_containers.push(vcs_init_container(event));
    }

    let mut main = json!({
        "name": WORKER_COMPONENT,
        "image": or_default(&container.image, &defaults.image),
        "imagePullPolicy": or_default(&container.image_pull_policy, &defaults.image_pull_policy),
        "env": container
            .environment
            .iter()
            .map(|(name, value)| json!({ "name": name, "value": value }))
            .collect::<Vec<_>>(),
        "volumeMounts": mounts,
    });
    let command = container.command_line();
    if !command.is_empty()
        && let Some(fields) = main.as_object_mut()
    {
        fields.insert("command".to_owned(), json!(command));
    }

    labelled(
        ResourceKind::Pod,
        namespace,
        worker_pod_name(event.id()),
        WORKER_COMPONENT,
        event,
    )
    .with_spec(json!({
        "serviceAccountName": WORKERS_PRINCIPAL,
        "restartPolicy": "Never",
        "imagePullSecrets": worker
            .kubernetes
            .image_pull_secrets
            .iter()
            .map(|name| json!({ "name": name }))
            .collect::<Vec<_>>(),
        "initContainers": init_containers,
        "containers": [main],
        "volumes": volumes,
    }))
}
