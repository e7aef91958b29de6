//! Provisioning of project namespaces, RBAC, and secret stores.

use crate::project::domain::{KubernetesConfig, Project, ProjectId, Secret};
use crate::scheduler::{
    domain::{
        COMPONENT_LABEL, ClusterResource, JOBS_PRINCIPAL, PROJECT_LABEL, PROJECT_SECRETS_NAME,
        ResourceKind, WORKERS_PRINCIPAL,
    },
    ports::{ClusterApi, ClusterError, ProjectsScheduler, SchedulerError, SchedulerResult},
};
use async_trait::async_trait;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

/// Length of the random suffix in project namespace names.
pub const NAMESPACE_TOKEN_LENGTH: usize = 10;

/// Projects scheduler that provisions resources through a [`ClusterApi`].
#[derive(Debug, Clone)]
pub struct ClusterProjectsScheduler<A>
where
    A: ClusterApi,
{
    cluster: Arc<A>,
}

impl<A> ClusterProjectsScheduler<A>
where
    A: ClusterApi,
{
    /// Creates a scheduler over `cluster`.
    #[must_use]
    pub const fn new(cluster: Arc<A>) -> Self {
        Self { cluster }
    }

    async fn project_secrets(&self, project: &Project) -> SchedulerResult<ClusterResource> {
        let namespace = namespace_of(project)?;
        self.cluster
            .get(ResourceKind::Secret, namespace, PROJECT_SECRETS_NAME)
            .await?
            .ok_or_else(|| {
                ClusterError::not_found(ResourceKind::Secret, namespace, PROJECT_SECRETS_NAME)
                    .into()
            })
    }

    async fn create_principal(
        &self,
        namespace: &str,
        principal: &str,
        rules: serde_json::Value,
    ) -> SchedulerResult<()> {
        self.cluster
            .create(
                &ClusterResource::new(ResourceKind::Role, namespace, principal)
                    .with_spec(json!({ "rules": rules })),
            )
            .await?;
        self.cluster
            .create(&ClusterResource::new(
                ResourceKind::ServiceAccount,
                namespace,
                principal,
            ))
            .await?;
        self.cluster
            .create(
                &ClusterResource::new(ResourceKind::RoleBinding, namespace, principal).with_spec(
                    json!({
                        "subjects": [{
                            "kind": "ServiceAccount",
                            "name": principal,
                            "namespace": namespace,
                        }],
                        "roleRef": { "kind": "Role", "name": principal },
                    }),
                ),
            )
            .await?;
        Ok(())
    }
}

fn namespace_of(project: &Project) -> SchedulerResult<&str> {
    project
        .namespace()
        .ok_or_else(|| SchedulerError::ProjectUnscheduled(project.id().clone()))
}

/// Returns a fresh namespace name for `id`.
fn namespace_for(id: &ProjectId) -> String {
    let token: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(NAMESPACE_TOKEN_LENGTH)
        .map(|byte| char::from(byte).to_ascii_lowercase())
        .collect();
    format!("brignext-{id}-{token}").to_lowercase()
}

#[async_trait]
impl<A> ProjectsScheduler for ClusterProjectsScheduler<A>
where
    A: ClusterApi,
{
    async fn create(&self, project: &Project) -> SchedulerResult<Project> {
        let namespace = namespace_for(project.id());
        let project_id = project.id().as_str();

        self.cluster
            .create(&ClusterResource::namespace_named(&namespace).with_label(PROJECT_LABEL, project_id))
            .await?;
        self.create_principal(
            &namespace,
            WORKERS_PRINCIPAL,
            json!([{
                "apiGroups": [""],
                "resources": ["configmaps", "secrets", "pods", "pods/log"],
                "verbs": ["create", "get", "list", "watch"],
            }]),
        )
        .await?;
        self.create_principal(&namespace, JOBS_PRINCIPAL, json!([]))
            .await?;
        self.cluster
            .create(
                &ClusterResource::new(ResourceKind::Secret, &namespace, PROJECT_SECRETS_NAME)
                    .with_label(COMPONENT_LABEL, PROJECT_SECRETS_NAME)
                    .with_label(PROJECT_LABEL, project_id)
                    .with_spec(json!({ "type": "brignext.io/project-secrets" })),
            )
            .await?;

        info!(project_id, namespace = %namespace, "provisioned project namespace");
        Ok(project
            .clone()
            .with_kubernetes(KubernetesConfig { namespace }))
    }

    async fn delete(&self, project: &Project) -> SchedulerResult<()> {
        let namespace = namespace_of(project)?;
        self.cluster
            .delete(ResourceKind::Namespace, namespace, namespace)
            .await?;
        info!(project_id = %project.id(), namespace, "deleted project namespace");
        Ok(())
    }

    async fn list_secrets(&self, project: &Project) -> SchedulerResult<Vec<Secret>> {
        let store = self.project_secrets(project).await?;
        // Keys were validated on the way in.
        Ok(store
            .data()
            .iter()
            .filter_map(|(key, value)| Secret::new(key.as_str(), value.as_str()).ok())
            .collect())
    }

    async fn set_secret(&self, project: &Project, secret: &Secret) -> SchedulerResult<()> {
        let mut store = self.project_secrets(project).await?;
        store
            .data_mut()
            .insert(secret.key().to_owned(), secret.value().to_owned());
        self.cluster.replace(&store).await?;
        debug!(project_id = %project.id(), key = secret.key(), "set project secret");
        Ok(())
    }

    async fn unset_secret(&self, project: &Project, key: &str) -> SchedulerResult<()> {
        let mut store = self.project_secrets(project).await?;
        if store.data_mut().remove(key).is_none() {
            return Ok(());
        }
        self.cluster.replace(&store).await?;
        debug!(project_id = %project.id(), key, "unset project secret");
        Ok(())
    }
}
