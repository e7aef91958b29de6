//! Project aggregate root.

use super::{EventLabels, EventSubscription, ProjectId, WorkerSpec};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Cluster placement assigned to a project by the projects scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesConfig {
    /// Namespace holding the project's workers, jobs and secrets.
    pub namespace: String,
}

/// User-controlled project configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectSpec {
    /// Subscriptions used to route provider events to this project.
    pub event_subscriptions: Vec<EventSubscription>,
    /// Worker defaults inherited by every event of this project.
    pub worker_template: WorkerSpec,
}

/// A project: the owner of events and of a cluster namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    id: ProjectId,
    description: String,
    spec: ProjectSpec,
    kubernetes: Option<KubernetesConfig>,
    created_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted project.
#[derive(Debug, Clone)]
pub struct PersistedProjectData {
    /// Persisted project identifier.
    pub id: ProjectId,
    /// Persisted description.
    pub description: String,
    /// Persisted specification.
    pub spec: ProjectSpec,
    /// Persisted cluster placement, if scheduled.
    pub kubernetes: Option<KubernetesConfig>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// Creates an unscheduled project.
    #[must_use]
    pub fn new(id: ProjectId, spec: ProjectSpec, clock: &impl Clock) -> Self {
        Self {
            id,
            description: String::new(),
            spec,
            kubernetes: None,
            created_at: clock.utc(),
        }
    }

    /// Reconstructs a project from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedProjectData) -> Self {
        Self {
            id: data.id,
            description: data.description,
            spec: data.spec,
            kubernetes: data.kubernetes,
            created_at: data.created_at,
        }
    }

    /// Sets the human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Records the cluster placement chosen by the scheduler.
    #[must_use]
    pub fn with_kubernetes(mut self, kubernetes: KubernetesConfig) -> Self {
        self.kubernetes = Some(kubernetes);
        self
    }

    /// Returns the project identifier.
    #[must_use]
    pub const fn id(&self) -> &ProjectId {
        &self.id
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the user-controlled configuration.
    #[must_use]
    pub const fn spec(&self) -> &ProjectSpec {
        &self.spec
    }

    /// Returns the cluster placement, once scheduled.
    #[must_use]
    pub const fn kubernetes(&self) -> Option<&KubernetesConfig> {
        self.kubernetes.as_ref()
    }

    /// Returns the project's namespace, once scheduled.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.kubernetes.as_ref().map(|config| config.namespace.as_str())
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns `true` when any subscription matches the event attributes.
    #[must_use]
    pub fn is_subscribed(&self, source: &str, event_type: &str, labels: &EventLabels) -> bool {
        self.spec
            .event_subscriptions
            .iter()
            .any(|subscription| subscription.matches(source, event_type, labels))
    }
}
