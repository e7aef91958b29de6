//! Namespaced cluster resources.

use super::ResourceLabels;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Kinds of cluster resource the schedulers and controller manage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// A namespace. Its own namespace field equals its name.
    Namespace,
    /// An RBAC role.
    Role,
    /// A service account.
    ServiceAccount,
    /// An RBAC role binding.
    RoleBinding,
    /// A secret holding string data.
    Secret,
    /// A config map.
    ConfigMap,
    /// A persistent volume claim.
    PersistentVolumeClaim,
    /// A pod.
    Pod,
}

impl ResourceKind {
    /// Returns the cluster's name for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Namespace => "Namespace",
            Self::Role => "Role",
            Self::ServiceAccount => "ServiceAccount",
            Self::RoleBinding => "RoleBinding",
            Self::Secret => "Secret",
            Self::ConfigMap => "ConfigMap",
            Self::PersistentVolumeClaim => "PersistentVolumeClaim",
            Self::Pod => "Pod",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A namespaced cluster object.
///
/// Secrets and config maps keep their entries in [`ClusterResource::data`];
/// kind-specific detail such as a pod spec or a secret type lives in
/// [`ClusterResource::spec`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterResource {
    kind: ResourceKind,
    namespace: String,
    name: String,
    labels: ResourceLabels,
    data: BTreeMap<String, String>,
    spec: Value,
}

impl ClusterResource {
    /// Creates an unlabelled resource with no data.
    #[must_use]
    pub fn new(kind: ResourceKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
            labels: ResourceLabels::new(),
            data: BTreeMap::new(),
            spec: Value::Null,
        }
    }

    /// Creates a namespace resource.
    #[must_use]
    pub fn namespace_named(name: impl Into<String>) -> Self {
        let owned = name.into();
        Self::new(ResourceKind::Namespace, owned.clone(), owned)
    }

    /// Adds a label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Adds a data entry.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Sets the kind-specific spec.
    #[must_use]
    pub fn with_spec(mut self, spec: Value) -> Self {
        self.spec = spec;
        self
    }

    /// Returns the kind.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Returns the namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the labels.
    #[must_use]
    pub const fn labels(&self) -> &ResourceLabels {
        &self.labels
    }

    /// Returns the data entries.
    #[must_use]
    pub const fn data(&self) -> &BTreeMap<String, String> {
        &self.data
    }

    /// Returns mutable access to the data entries.
    pub const fn data_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.data
    }

    /// Returns the kind-specific spec.
    #[must_use]
    pub const fn spec(&self) -> &Value {
        &self.spec
    }
}
