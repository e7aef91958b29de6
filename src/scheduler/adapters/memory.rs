//! In-memory cluster for tests and local runs.

use crate::scheduler::{
    domain::{ClusterResource, LabelSelector, ResourceKind},
    ports::{ClusterApi, ClusterError, ClusterResult},
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, RwLockWriteGuard};

type ResourceKey = (ResourceKind, String, String);

/// Thread-safe in-memory cluster.
///
/// Namespaces must exist before resources are created in them, and deleting
/// a namespace deletes its contents, mirroring a real cluster.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCluster {
    state: Arc<RwLock<InMemoryClusterState>>,
}

#[derive(Debug, Default)]
struct InMemoryClusterState {
    resources: BTreeMap<ResourceKey, ClusterResource>,
    failing_kinds: BTreeSet<ResourceKind>,
}

fn key(kind: ResourceKind, namespace: &str, name: &str) -> ResourceKey {
    (kind, namespace.to_owned(), name.to_owned())
}

fn lock_error(err: impl ToString) -> ClusterError {
    ClusterError::backend(std::io::Error::other(err.to_string()))
}

impl InMemoryCluster {
    /// Creates an empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent creation of `kind` fail until cleared.
    ///
    /// # Errors
    ///
    /// Returns cluster errors when lock acquisition fails.
    pub fn fail_creates_of(&self, kind: ResourceKind, failing: bool) -> ClusterResult<()> {
        let mut state = self.write()?;
        if failing {
            state.failing_kinds.insert(kind);
        } else {
            state.failing_kinds.remove(&kind);
        }
        Ok(())
    }

    /// Returns every resource of `kind` in `namespace`, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns cluster errors when lock acquisition fails.
    pub fn resources(&self, kind: ResourceKind, namespace: &str) -> ClusterResult<Vec<ClusterResource>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state
            .resources
            .values()
            .filter(|resource| resource.kind() == kind && resource.namespace() == namespace)
            .cloned()
            .collect())
    }

    /// Returns the names of all namespaces.
    ///
    /// # Errors
    ///
    /// Returns cluster errors when lock acquisition fails.
    pub fn namespaces(&self) -> ClusterResult<Vec<String>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state
            .resources
            .values()
            .filter(|resource| resource.kind() == ResourceKind::Namespace)
            .map(|resource| resource.name().to_owned())
            .collect())
    }

    fn write(&self) -> ClusterResult<RwLockWriteGuard<'_, InMemoryClusterState>> {
        self.state.write().map_err(lock_error)
    }
}

#[async_trait]
impl ClusterApi for InMemoryCluster {
    async fn create(&self, resource: &ClusterResource) -> ClusterResult<()> {
        let mut state = self.write()?;
        if state.failing_kinds.contains(&resource.kind()) {
            return Err(ClusterError::backend(std::io::Error::other(format!(
                "injected failure creating {}",
                resource.kind()
            ))));
        }
        let namespace = resource.namespace();
        if resource.kind() != ResourceKind::Namespace
            && !state
                .resources
                .contains_key(&key(ResourceKind::Namespace, namespace, namespace))
        {
            return Err(ClusterError::not_found(
                ResourceKind::Namespace,
                namespace,
                namespace,
            ));
        }
        let resource_key = key(resource.kind(), namespace, resource.name());
        if state.resources.contains_key(&resource_key) {
            return Err(ClusterError::AlreadyExists {
                kind: resource.kind(),
                namespace: namespace.to_owned(),
                name: resource.name().to_owned(),
            });
        }
        state.resources.insert(resource_key, resource.clone());
        Ok(())
    }

    async fn replace(&self, resource: &ClusterResource) -> ClusterResult<()> {
        let mut state = self.write()?;
        let resource_key = key(resource.kind(), resource.namespace(), resource.name());
        let Some(existing) = state.resources.get_mut(&resource_key) else {
            return Err(ClusterError::not_found(
                resource.kind(),
                resource.namespace(),
                resource.name(),
            ));
        };
        *existing = resource.clone();
        Ok(())
    }

    async fn get(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Option<ClusterResource>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.resources.get(&key(kind, namespace, name)).cloned())
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
        selector: &LabelSelector,
    ) -> ClusterResult<Vec<ClusterResource>> {
        Ok(self
            .resources(kind, namespace)?
            .into_iter()
            .filter(|resource| selector.matches(resource.labels()))
            .collect())
    }

    async fn delete(&self, kind: ResourceKind, namespace: &str, name: &str) -> ClusterResult<()> {
        let mut state = self.write()?;
        if state.resources.remove(&key(kind, namespace, name)).is_none() {
            return Err(ClusterError::not_found(kind, namespace, name));
        }
        if kind == ResourceKind::Namespace {
            state
                .resources
                .retain(|(_, resource_namespace, _), _| resource_namespace != namespace);
        }
        Ok(())
    }

    async fn delete_matching(
        &self,
        kind: ResourceKind,
        namespace: &str,
        selector: &LabelSelector,
    ) -> ClusterResult<usize> {
        let mut state = self.write()?;
        let before = state.resources.len();
        state.resources.retain(|_, resource| {
            !(resource.kind() == kind
                && resource.namespace() == namespace
                && selector.matches(resource.labels()))
        });
        Ok(before.saturating_sub(state.resources.len()))
    }
}
