//! In-memory integration tests for event lifecycle operations.

use super::helpers::{Stack, stack};
use brignext::error::ErrorKind;
use brignext::event::{
    domain::{
        EventDetails, EventId, JobPhase, JobStatus, LogEntry, LogSource, WorkerPhase,
        WorkerStatus,
    },
    services::{CreateEventRequest, EventsServiceError},
};
use brignext::messaging::domain::QueueName;
use brignext::project::domain::ProjectId;
use brignext::scheduler::domain::{ResourceKind, event_secret_name, worker_secret_name};
use rstest::rstest;

fn queue(name: &str) -> QueueName {
    QueueName::new(name).expect("valid queue name")
}

fn push() -> CreateEventRequest {
    CreateEventRequest::new(EventDetails::new("github", "push"))
}

async fn single_event(stack: &Stack, project: &str) -> EventId {
    let project_id = ProjectId::new(project).expect("valid project id");
    let created = stack
        .events
        .create(push().for_project(project_id))
        .await
        .expect("event creation should succeed");
    assert_eq!(created.len(), 1);
    created.first().expect("one event").id()
}

async fn report(stack: &Stack, id: EventId, phases: &[WorkerPhase]) {
    for phase in phases {
        stack
            .events
            .update_worker_status(id, &WorkerStatus::in_phase(*phase))
            .await
            .expect("phase change should be allowed");
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn provider_event_fans_out_to_subscribed_projects(stack: Stack) {
    let blog = stack.github_project("blog").await;
    let docs = stack.github_project("docs").await;

    let created = stack
        .events
        .create(push())
        .await
        .expect("fan-out should succeed");

    let mut owners: Vec<&str> = created
        .iter()
        .map(|event| event.project_id().as_str())
        .collect();
    owners.sort_unstable();
    assert_eq!(owners, vec!["blog", "docs"]);
    for project in [&blog, &docs] {
        assert_eq!(
            stack
                .broker
                .scheduled_len(&queue(project.id().as_str()))
                .expect("scheduled"),
            1
        );
    }
    for event in &created {
        assert_eq!(event.worker_phase(), WorkerPhase::Pending);
        let namespace = event.namespace().expect("event should be scheduled");
        let secrets: Vec<String> = stack
            .cluster
            .resources(ResourceKind::Secret, namespace)
            .expect("secrets")
            .iter()
            .map(|secret| secret.name().to_owned())
            .collect();
        assert!(secrets.contains(&event_secret_name(event.id())));
        assert!(secrets.contains(&worker_secret_name(event.id())));
    }
}

#[rstest]
#[case::other_source(EventDetails::new("gitlab", "push"))]
#[case::other_type(EventDetails::new("github", "release"))]
#[tokio::test(flavor = "multi_thread")]
async fn unmatched_event_creates_nothing(stack: Stack, #[case] details: EventDetails) {
    stack.github_project("blog").await;

    let created = stack
        .events
        .create(CreateEventRequest::new(details))
        .await
        .expect("creation should succeed");

    assert!(created.is_empty());
    assert_eq!(stack.broker.scheduled_len(&queue("blog")).expect("scheduled"), 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn targeted_event_for_unknown_project_is_not_found(stack: Stack) {
    let err = stack
        .events
        .create(push().for_project(ProjectId::new("ghost").expect("valid project id")))
        .await
        .expect_err("unknown project should fail");

    assert!(matches!(err, EventsServiceError::ProjectNotFound(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn worker_phase_only_moves_along_allowed_transitions(stack: Stack) {
    stack.github_project("blog").await;
    let id = single_event(&stack, "blog").await;

    let err = stack
        .events
        .update_worker_status(id, &WorkerStatus::in_phase(WorkerPhase::Succeeded))
        .await
        .expect_err("pending worker cannot succeed directly");
    assert_eq!(err.kind(), ErrorKind::Conflict);

    report(&stack, id, &[WorkerPhase::Running, WorkerPhase::Succeeded]).await;
    let event = stack.events.get(id).await.expect("event lookup");
    assert_eq!(event.worker_phase(), WorkerPhase::Succeeded);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn job_logs_require_a_known_job(stack: Stack) {
    stack.github_project("blog").await;
    let id = single_event(&stack, "blog").await;
    let running = JobStatus {
        started: None,
        ended: None,
        phase: JobPhase::Running,
    };
    stack
        .events
        .update_job_status(id, "build", &running)
        .await
        .expect("job status update");
    stack
        .logs
        .append(
            id,
            LogSource::Job("build".to_owned()),
            LogEntry {
                time: None,
                message: "compiling".to_owned(),
            },
        )
        .expect("append log line");

    let lines = stack
        .events
        .get_logs(id, &LogSource::Job("build".to_owned()))
        .await
        .expect("job logs");
    let messages: Vec<&str> = lines.iter().map(|line| line.message.as_str()).collect();
    assert_eq!(messages, vec!["compiling"]);

    let err = stack
        .events
        .get_logs(id, &LogSource::Job("test".to_owned()))
        .await
        .expect_err("unknown job should fail");
    assert!(matches!(err, EventsServiceError::JobNotFound { .. }));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn project_wide_cancel_skips_running_workers_by_default(stack: Stack) {
    let project = stack.github_project("blog").await;
    let pending = single_event(&stack, "blog").await;
    let running = single_event(&stack, "blog").await;
    report(&stack, running, &[WorkerPhase::Running]).await;

    let outcome = stack
        .events
        .cancel_by_project(project.id(), false)
        .await
        .expect("sweep should succeed");

    assert_eq!(outcome.matched, vec![pending]);
    assert_eq!(outcome.skipped, vec![running]);
    assert!(outcome.failed.is_empty());
    let canceled = stack.events.get(pending).await.expect("event lookup");
    assert_eq!(canceled.worker_phase(), WorkerPhase::Canceled);
    assert!(canceled.canceled().is_some());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleting_a_finished_event_removes_its_secrets(stack: Stack) {
    stack.github_project("blog").await;
    let id = single_event(&stack, "blog").await;
    report(&stack, id, &[WorkerPhase::Running, WorkerPhase::Failed]).await;
    let namespace = stack
        .events
        .get(id)
        .await
        .expect("event lookup")
        .namespace()
        .expect("scheduled")
        .to_owned();

    let matched = stack
        .events
        .delete(id, false, false)
        .await
        .expect("delete should succeed");

    assert!(matched);
    let err = stack.events.get(id).await.expect_err("event should be gone");
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let remaining: Vec<String> = stack
        .cluster
        .resources(ResourceKind::Secret, &namespace)
        .expect("secrets")
        .iter()
        .map(|secret| secret.name().to_owned())
        .collect();
    assert!(!remaining.contains(&event_secret_name(id)));
    assert!(!remaining.contains(&worker_secret_name(id)));
}
