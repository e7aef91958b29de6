//! Domain model for projects.
//!
//! Projects are plain data plus validation: the worker template, event
//! subscriptions, and the cluster namespace assigned at creation time.

mod error;
mod ids;
mod project;
mod secret;
mod subscription;
mod worker;

pub use error::{ParseLogLevelError, ProjectDomainError};
pub use ids::ProjectId;
pub use project::{KubernetesConfig, PersistedProjectData, Project, ProjectSpec};
pub use secret::{REDACTED_SECRET_VALUE, Secret};
pub use subscription::{EventLabels, EventSubscription};
pub use worker::{
    ContainerSpec, JobsKubernetesConfig, JobsSpec, LogLevel, WorkerGitConfig,
    WorkerKubernetesConfig, WorkerSpec,
};
