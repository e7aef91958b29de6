//! Tests for the event aggregate and the worker phase state machine.

use crate::event::domain::{
    Event, EventDetails, EventDomainError, EventListFilter, WorkerPhase, WorkerStatus,
};
use crate::project::domain::{ProjectId, WorkerSpec};
use chrono::Utc;
use mockable::DefaultClock;
use rstest::{fixture, rstest};

fn new_event() -> Event {
    Event::pending(
        ProjectId::new("blog").expect("valid project id"),
        EventDetails::new("github", "push"),
        WorkerSpec::default(),
        &DefaultClock,
    )
}

#[fixture]
fn pending_event() -> Event {
    new_event()
}

fn event_in(phase: WorkerPhase) -> Event {
    let mut event = new_event();
    if phase != WorkerPhase::Pending {
        if !WorkerPhase::Pending.can_transition_to(phase) {
            event
                .replace_worker_status(WorkerStatus::in_phase(WorkerPhase::Running))
                .expect("pending to running");
        }
        event
            .replace_worker_status(WorkerStatus::in_phase(phase))
            .expect("reachable phase");
    }
    event
}

#[rstest]
#[case(WorkerPhase::Pending, WorkerPhase::Running, true)]
#[case(WorkerPhase::Pending, WorkerPhase::Canceled, true)]
#[case(WorkerPhase::Pending, WorkerPhase::Succeeded, false)]
#[case(WorkerPhase::Running, WorkerPhase::Succeeded, true)]
#[case(WorkerPhase::Running, WorkerPhase::Aborted, true)]
#[case(WorkerPhase::Running, WorkerPhase::Canceled, false)]
#[case(WorkerPhase::Running, WorkerPhase::Pending, false)]
#[case(WorkerPhase::Unknown, WorkerPhase::Running, true)]
#[case(WorkerPhase::Succeeded, WorkerPhase::Running, false)]
#[case(WorkerPhase::Running, WorkerPhase::Running, true)]
fn transition_table_is_enforced(
    #[case] from: WorkerPhase,
    #[case] to: WorkerPhase,
    #[case] allowed: bool,
) {
    assert_eq!(from.can_transition_to(to), allowed);
}

#[test]
fn terminal_phases_have_no_transitions() {
    for phase in WorkerPhase::TERMINAL {
        assert!(phase.is_terminal());
        assert!(phase.allowed_transitions().is_empty());
    }
}

#[rstest]
fn phase_names_parse_back(
    #[values(WorkerPhase::Pending, WorkerPhase::TimedOut, WorkerPhase::Unknown)] phase: WorkerPhase,
) {
    assert_eq!(WorkerPhase::try_from(phase.as_str()), Ok(phase));
}

#[rstest]
fn invalid_status_update_is_rejected(pending_event: Event) {
    let mut event = pending_event;

    let result = event.replace_worker_status(WorkerStatus::in_phase(WorkerPhase::Succeeded));

    assert_eq!(
        result,
        Err(EventDomainError::InvalidWorkerTransition {
            from: WorkerPhase::Pending,
            to: WorkerPhase::Succeeded,
        })
    );
    assert_eq!(event.worker_phase(), WorkerPhase::Pending);
}

#[rstest]
#[case(WorkerPhase::Pending, false, Some(WorkerPhase::Canceled))]
#[case(WorkerPhase::Pending, true, Some(WorkerPhase::Canceled))]
#[case(WorkerPhase::Running, false, None)]
#[case(WorkerPhase::Running, true, Some(WorkerPhase::Aborted))]
#[case(WorkerPhase::Unknown, true, Some(WorkerPhase::Aborted))]
#[case(WorkerPhase::Succeeded, true, None)]
#[case(WorkerPhase::Canceled, true, None)]
fn cancellation_is_phase_gated(
    #[case] phase: WorkerPhase,
    #[case] cancel_running: bool,
    #[case] expected: Option<WorkerPhase>,
) {
    let mut event = event_in(phase);
    let at = Utc::now();

    let changed = event.cancel(cancel_running, at);

    assert_eq!(changed, expected.is_some());
    assert_eq!(event.worker_phase(), expected.unwrap_or(phase));
    assert_eq!(event.canceled(), expected.map(|_| at));
}

#[rstest]
#[case(WorkerPhase::Pending, false, false, false)]
#[case(WorkerPhase::Pending, true, false, true)]
#[case(WorkerPhase::Running, true, false, false)]
#[case(WorkerPhase::Running, false, true, true)]
#[case(WorkerPhase::Failed, false, false, true)]
#[case(WorkerPhase::Aborted, false, false, true)]
fn deletion_is_phase_gated(
    #[case] phase: WorkerPhase,
    #[case] delete_pending: bool,
    #[case] delete_running: bool,
    #[case] deletable: bool,
) {
    assert_eq!(
        event_in(phase).is_deletable(delete_pending, delete_running),
        deletable
    );
}

#[rstest]
fn event_serializes_with_wire_field_names(pending_event: Event) {
    let value = serde_json::to_value(&pending_event).expect("serialize event");

    assert_eq!(value["projectID"], "blog");
    assert_eq!(value["source"], "github");
    assert_eq!(value["type"], "push");
    assert_eq!(value["status"]["workerStatus"]["phase"], "PENDING");

    let decoded: Event = serde_json::from_value(value).expect("deserialize event");
    assert_eq!(decoded, pending_event);
}

#[rstest]
#[case(EventDetails::new("", "push"), Err(EventDomainError::EmptySource))]
#[case(EventDetails::new("github", " "), Err(EventDomainError::EmptyType))]
#[case(EventDetails::new("github", "push"), Ok(()))]
fn details_need_source_and_type(
    #[case] details: EventDetails,
    #[case] expected: Result<(), EventDomainError>,
) {
    assert_eq!(details.validate(), expected);
}

#[rstest]
fn filter_selects_by_project_and_phase(pending_event: Event) {
    let blog = ProjectId::new("blog").expect("valid project id");
    let docs = ProjectId::new("docs").expect("valid project id");

    assert!(EventListFilter::new().matches(&pending_event));
    assert!(EventListFilter::new()
        .with_project(blog)
        .with_worker_phases([WorkerPhase::Pending, WorkerPhase::Running])
        .matches(&pending_event));
    assert!(!EventListFilter::new().with_project(docs).matches(&pending_event));
    assert!(!EventListFilter::new()
        .with_worker_phases([WorkerPhase::Running])
        .matches(&pending_event));
}
