//! In-memory integration tests for the controller's worker flow.

use std::sync::Arc;
use std::time::Duration;

use super::helpers::{Stack, stack};
use brignext::config::ControllerConfig;
use brignext::controller::{
    adapters::ServiceControllerApi,
    domain::{worker_pod_name, workspace_claim_name},
    services::WorkerManager,
};
use brignext::event::{
    adapters::memory::{InMemoryEventStore, InMemoryLogStore},
    domain::{Event, EventDetails, WorkerPhase, WorkerStatus},
    services::CreateEventRequest,
};
use brignext::messaging::adapters::memory::InMemoryBroker;
use brignext::project::adapters::memory::InMemoryProjectStore;
use brignext::scheduler::{
    adapters::memory::InMemoryCluster,
    domain::ResourceKind,
    services::{ClusterEventsScheduler, ClusterProjectsScheduler},
};
use mockable::DefaultClock;
use rstest::rstest;
use tokio_util::sync::CancellationToken;

type TestApi = ServiceControllerApi<
    InMemoryEventStore,
    InMemoryProjectStore,
    ClusterEventsScheduler<InMemoryCluster, InMemoryBroker, DefaultClock>,
    InMemoryLogStore,
    ClusterProjectsScheduler<InMemoryCluster>,
    DefaultClock,
>;

fn manager(stack: &Stack) -> Arc<WorkerManager<TestApi, InMemoryCluster>> {
    let api = Arc::new(ServiceControllerApi::new(
        Arc::clone(&stack.events),
        Arc::clone(&stack.projects),
    ));
    let config = ControllerConfig::default().with_status_poll_interval(Duration::from_secs(1));
    Arc::new(WorkerManager::new(api, Arc::clone(&stack.cluster), &config))
}

async fn created_event(stack: &Stack) -> Event {
    let project = stack.github_project("blog").await;
    stack
        .events
        .create(
            CreateEventRequest::new(EventDetails::new("github", "push"))
                .for_project(project.id().clone()),
        )
        .await
        .expect("event creation should succeed")
        .into_iter()
        .next()
        .expect("one event")
}

async fn wait_for_pod(stack: &Stack, namespace: &str) {
    for _ in 0..100 {
        let pods = stack
            .cluster
            .resources(ResourceKind::Pod, namespace)
            .expect("pods");
        if !pods.is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("worker pod was never created");
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn worker_runs_until_the_event_finishes(stack: Stack) {
    let event = created_event(&stack).await;
    let id = event.id();
    let namespace = event.namespace().expect("scheduled").to_owned();
    let manager = manager(&stack);
    let cancel = CancellationToken::new();

    let running = {
        let worker = Arc::clone(&manager);
        let token = cancel.clone();
        tokio::spawn(async move { worker.run_worker(&token, id).await })
    };
    wait_for_pod(&stack, &namespace).await;
    assert_eq!(manager.available_capacity(), 0);

    let pods = stack
        .cluster
        .resources(ResourceKind::Pod, &namespace)
        .expect("pods");
    let claims = stack
        .cluster
        .resources(ResourceKind::PersistentVolumeClaim, &namespace)
        .expect("claims");
    assert_eq!(
        pods.iter().map(|pod| pod.name().to_owned()).collect::<Vec<_>>(),
        vec![worker_pod_name(id)]
    );
    assert_eq!(
        claims.iter().map(|claim| claim.name().to_owned()).collect::<Vec<_>>(),
        vec![workspace_claim_name(id)]
    );

    for phase in [WorkerPhase::Running, WorkerPhase::Succeeded] {
        stack
            .events
            .update_worker_status(id, &WorkerStatus::in_phase(phase))
            .await
            .expect("phase change");
    }
    tokio::time::timeout(Duration::from_secs(30), running)
        .await
        .expect("worker should finish")
        .expect("worker task should not panic")
        .expect("worker should succeed");

    assert_eq!(manager.available_capacity(), 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn canceled_event_never_gets_a_worker(stack: Stack) {
    let event = created_event(&stack).await;
    let namespace = event.namespace().expect("scheduled").to_owned();
    assert!(
        stack
            .events
            .cancel(event.id(), false)
            .await
            .expect("cancel should succeed")
    );

    manager(&stack)
        .run_worker(&CancellationToken::new(), event.id())
        .await
        .expect("canceled event is a no-op");

    assert!(
        stack
            .cluster
            .resources(ResourceKind::Pod, &namespace)
            .expect("pods")
            .is_empty()
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn deleting_the_event_ends_the_wait(stack: Stack) {
    let event = created_event(&stack).await;
    let id = event.id();
    let namespace = event.namespace().expect("scheduled").to_owned();
    let manager = manager(&stack);
    let cancel = CancellationToken::new();

    let running = {
        let worker = Arc::clone(&manager);
        let token = cancel.clone();
        tokio::spawn(async move { worker.run_worker(&token, id).await })
    };
    wait_for_pod(&stack, &namespace).await;
    assert!(
        stack
            .events
            .delete(id, true, true)
            .await
            .expect("delete should succeed")
    );

    tokio::time::timeout(Duration::from_secs(30), running)
        .await
        .expect("worker should finish")
        .expect("worker task should not panic")
        .expect("a deleted event ends the wait");
    assert!(
        stack
            .cluster
            .resources(ResourceKind::Pod, &namespace)
            .expect("pods")
            .is_empty()
    );
}
