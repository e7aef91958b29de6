//! Tests for the in-memory project store.

use crate::project::{
    adapters::memory::InMemoryProjectStore,
    domain::{EventLabels, EventSubscription, Project, ProjectId, ProjectSpec},
    ports::{ProjectStore, ProjectStoreError},
};
use mockable::DefaultClock;
use rstest::{fixture, rstest};

#[fixture]
fn store() -> InMemoryProjectStore {
    InMemoryProjectStore::new()
}

fn project(id: &str, subscriptions: Vec<EventSubscription>) -> Project {
    let spec = ProjectSpec {
        event_subscriptions: subscriptions,
        ..ProjectSpec::default()
    };
    Project::new(ProjectId::new(id).expect("valid id"), spec, &DefaultClock)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn projects_are_listed_by_identifier(store: InMemoryProjectStore) {
    for id in ["gamma", "alpha", "beta"] {
        store.create(&project(id, Vec::new())).await.expect("create");
    }

    let listed = store.list().await.expect("list");
    let ids: Vec<&str> = listed.iter().map(|found| found.id().as_str()).collect();

    assert_eq!(ids, vec!["alpha", "beta", "gamma"]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn duplicate_and_missing_projects_are_reported(store: InMemoryProjectStore) {
    let blog = project("blog", Vec::new());
    store.create(&blog).await.expect("create");

    assert!(matches!(
        store.create(&blog).await,
        Err(ProjectStoreError::Duplicate(_))
    ));
    store.delete(blog.id()).await.expect("delete");
    assert!(matches!(
        store.delete(blog.id()).await,
        Err(ProjectStoreError::NotFound(_))
    ));
    assert_eq!(store.find_by_id(blog.id()).await.expect("find"), None);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn subscribed_projects_are_selected(store: InMemoryProjectStore) {
    store
        .create(&project("alpha", vec![EventSubscription::new("github", ["push"])]))
        .await
        .expect("create");
    store
        .create(&project("beta", vec![EventSubscription::new("github", ["*"])]))
        .await
        .expect("create");
    store
        .create(&project("gamma", vec![EventSubscription::new("gitlab", ["push"])]))
        .await
        .expect("create");

    let matched = store
        .list_subscribed("github", "release", &EventLabels::new())
        .await
        .expect("list subscribed");
    let ids: Vec<&str> = matched.iter().map(|found| found.id().as_str()).collect();

    assert_eq!(ids, vec!["beta"]);
}
