//! In-memory project store for tests and single-process deployments.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::project::{
    domain::{EventLabels, Project, ProjectId},
    ports::{ProjectStore, ProjectStoreError, ProjectStoreResult},
};

/// Thread-safe in-memory project store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProjectStore {
    state: Arc<RwLock<BTreeMap<ProjectId, Project>>>,
}

impl InMemoryProjectStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read_all(&self) -> ProjectStoreResult<Vec<Project>> {
        let state = self.state.read().map_err(|err| {
            ProjectStoreError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(state.values().cloned().collect())
    }
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn create(&self, project: &Project) -> ProjectStoreResult<()> {
        let mut state = self.state.write().map_err(|err| {
            ProjectStoreError::persistence(std::io::Error::other(err.to_string()))
        })?;
        if state.contains_key(project.id()) {
            return Err(ProjectStoreError::Duplicate(project.id().clone()));
        }
        state.insert(project.id().clone(), project.clone());
        Ok(())
    }

    async fn list(&self) -> ProjectStoreResult<Vec<Project>> {
        self.read_all()
    }

    async fn list_subscribed(
        &self,
        source: &str,
        event_type: &str,
        labels: &EventLabels,
    ) -> ProjectStoreResult<Vec<Project>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|project| project.is_subscribed(source, event_type, labels))
            .collect())
    }

    async fn find_by_id(&self, id: &ProjectId) -> ProjectStoreResult<Option<Project>> {
        let state = self.state.read().map_err(|err| {
            ProjectStoreError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(state.get(id).cloned())
    }

    async fn delete(&self, id: &ProjectId) -> ProjectStoreResult<()> {
        let mut state = self.state.write().map_err(|err| {
            ProjectStoreError::persistence(std::io::Error::other(err.to_string()))
        })?;
        state
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ProjectStoreError::NotFound(id.clone()))
    }
}
