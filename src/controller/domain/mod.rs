//! Cluster resources the controller creates for a worker.

mod provisioning;

pub use provisioning::{
    EVENT_MOUNT_PATH, GIT_SIDECAR_IMAGE, VCS_MOUNT_PATH, WORKER_COMPONENT, WORKSPACE_COMPONENT,
    WORKSPACE_MOUNT_PATH, WorkerDefaults, worker_pod, worker_pod_name, workspace_claim,
    workspace_claim_name,
};
