//! In-memory integration tests for project lifecycle operations.

use super::helpers::{Stack, stack};
use brignext::error::ErrorKind;
use brignext::project::{
    domain::{ProjectId, ProjectSpec, REDACTED_SECRET_VALUE, Secret},
    services::CreateProjectRequest,
};
use brignext::scheduler::domain::{GIT_SSH_KEY, PROJECT_SECRETS_NAME, ResourceKind};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn created_project_owns_a_fresh_namespace(stack: Stack) {
    let project = stack.github_project("blog").await;

    let namespace = project.namespace().expect("project should be scheduled");
    assert!(namespace.starts_with("brignext-blog-"));
    assert_eq!(
        stack.cluster.namespaces().expect("namespaces"),
        vec![namespace.to_owned()]
    );
    let stored = stack
        .projects
        .get(project.id())
        .await
        .expect("project lookup should succeed");
    assert_eq!(stored, project);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn duplicate_project_is_rejected_without_touching_the_cluster(stack: Stack) {
    stack.github_project("blog").await;

    let err = stack
        .projects
        .create(CreateProjectRequest::new(
            ProjectId::new("blog").expect("valid project id"),
            ProjectSpec::default(),
        ))
        .await
        .expect_err("duplicate project should fail");

    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(stack.cluster.namespaces().expect("namespaces").len(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn secrets_are_stored_in_the_project_namespace_and_listed_redacted(stack: Stack) {
    let project = stack.github_project("blog").await;
    let id = project.id();
    let namespace = project.namespace().expect("scheduled");

    stack
        .projects
        .set_secret(id, &Secret::new(GIT_SSH_KEY, "-----BEGIN KEY-----").expect("secret"))
        .await
        .expect("set secret");
    stack
        .projects
        .set_secret(id, &Secret::new("token", "abc123").expect("secret"))
        .await
        .expect("set secret");
    stack
        .projects
        .unset_secret(id, "token")
        .await
        .expect("unset secret");

    let listed = stack.projects.list_secrets(id).await.expect("list secrets");
    let keys: Vec<&str> = listed.iter().map(Secret::key).collect();
    assert_eq!(keys, vec![GIT_SSH_KEY]);
    assert!(listed.iter().all(|secret| secret.value() == REDACTED_SECRET_VALUE));

    let stored = stack
        .cluster
        .resources(ResourceKind::Secret, namespace)
        .expect("secrets")
        .into_iter()
        .find(|secret| secret.name() == PROJECT_SECRETS_NAME)
        .expect("project secret store");
    assert_eq!(
        stored.data().get(GIT_SSH_KEY).map(String::as_str),
        Some("-----BEGIN KEY-----")
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleted_project_releases_its_namespace(stack: Stack) {
    let project = stack.github_project("blog").await;

    stack
        .projects
        .delete(project.id())
        .await
        .expect("project deletion should succeed");

    assert!(stack.cluster.namespaces().expect("namespaces").is_empty());
    let err = stack
        .projects
        .get(project.id())
        .await
        .expect_err("deleted project should be gone");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
