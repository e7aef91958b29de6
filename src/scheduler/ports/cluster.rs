//! Narrow contract over the cluster orchestration API.

use crate::scheduler::domain::{ClusterResource, LabelSelector, ResourceKind};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for cluster operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Namespaced resource access keyed by name and label selector.
///
/// Deleting a namespace deletes everything inside it.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Creates a resource.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::AlreadyExists`] when the name is taken within
    /// the namespace, or [`ClusterError::NotFound`] when the namespace does
    /// not exist.
    async fn create(&self, resource: &ClusterResource) -> ClusterResult<()>;

    /// Replaces an existing resource.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::NotFound`] when the resource does not exist.
    async fn replace(&self, resource: &ClusterResource) -> ClusterResult<()>;

    /// Fetches a resource by name.
    async fn get(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Option<ClusterResource>>;

    /// Lists resources of `kind` in `namespace` matching `selector`.
    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
        selector: &LabelSelector,
    ) -> ClusterResult<Vec<ClusterResource>>;

    /// Deletes a resource by name.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::NotFound`] when the resource does not exist.
    async fn delete(&self, kind: ResourceKind, namespace: &str, name: &str) -> ClusterResult<()>;

    /// Deletes every resource of `kind` in `namespace` matching `selector`
    /// and returns how many were removed.
    async fn delete_matching(
        &self,
        kind: ResourceKind,
        namespace: &str,
        selector: &LabelSelector,
    ) -> ClusterResult<usize>;
}

/// Errors returned by cluster implementations.
#[derive(Debug, Clone, Error)]
pub enum ClusterError {
    /// A resource with the same kind, namespace and name exists.
    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        /// Resource kind.
        kind: ResourceKind,
        /// Resource namespace.
        namespace: String,
        /// Resource name.
        name: String,
    },

    /// The resource or its namespace does not exist.
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Resource kind.
        kind: ResourceKind,
        /// Resource namespace.
        namespace: String,
        /// Resource name.
        name: String,
    },

    /// Cluster API failure.
    #[error("cluster API error: {0}")]
    Backend(Arc<dyn std::error::Error + Send + Sync>),
}

impl ClusterError {
    /// Wraps a cluster API error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Arc::new(err))
    }

    /// Builds a [`ClusterError::NotFound`] for the given coordinates.
    #[must_use]
    pub fn not_found(kind: ResourceKind, namespace: &str, name: &str) -> Self {
        Self::NotFound {
            kind,
            namespace: namespace.to_owned(),
            name: name.to_owned(),
        }
    }
}
