//! Cluster resource model used by the schedulers and the controller.

mod labels;
mod resource;
mod work;

pub use labels::{
    COMPONENT_LABEL, EVENT_LABEL, LabelRequirement, LabelSelector, PROJECT_LABEL, ResourceLabels,
};
pub use resource::{ClusterResource, ResourceKind};
pub use work::{
    EVENT_DOCUMENT_KEY, GIT_SSH_CERT, GIT_SSH_KEY, JOBS_PRINCIPAL, PROJECT_SECRETS_NAME,
    WORKER_DOCUMENT_KEY, WORKER_MESSAGE_DELAY, WORKERS_PRINCIPAL, WorkerMessage,
    event_secret_name, worker_secret_name,
};
