//! Given steps for event cancellation BDD scenarios.

use super::world::{CancellationWorld, run_async};
use brignext::event::domain::{EventDetails, WorkerPhase, WorkerStatus};
use brignext::event::services::CreateEventRequest;
use brignext::project::{
    domain::{ProjectId, ProjectSpec},
    services::CreateProjectRequest,
};
use eyre::WrapErr;
use rstest_bdd_macros::given;

#[given(r#"a provisioned project "{id}""#)]
fn provisioned_project(world: &mut CancellationWorld, id: String) -> Result<(), eyre::Report> {
    let project_id = ProjectId::new(id).wrap_err("valid project id")?;
    let project = run_async(
        world
            .projects
            .create(CreateProjectRequest::new(project_id, ProjectSpec::default())),
    )
    .wrap_err("create project for cancellation scenario")?;
    world.project = Some(project);
    Ok(())
}

#[given(r#"an event from "{source}" of type "{event_type}" for the project"#)]
fn event_for_project(
    world: &mut CancellationWorld,
    source: String,
    event_type: String,
) -> Result<(), eyre::Report> {
    let project_id = world
        .project
        .as_ref()
        .map(|project| project.id().clone())
        .ok_or_else(|| eyre::eyre!("missing project in scenario world"))?;
    let request =
        CreateEventRequest::new(EventDetails::new(source, event_type)).for_project(project_id);
    let created = run_async(world.events.create(request)).wrap_err("create event")?;
    world.event = created.into_iter().next();
    Ok(())
}

#[given(r#"the worker has reported phase "{phase}""#)]
fn worker_reported_phase(world: &mut CancellationWorld, phase: String) -> Result<(), eyre::Report> {
    let reported = WorkerPhase::try_from(phase.as_str())
        .map_err(|err| eyre::eyre!("invalid phase in scenario: {err}"))?;
    let id = world.event()?.id();
    run_async(
        world
            .events
            .update_worker_status(id, &WorkerStatus::in_phase(reported)),
    )
    .wrap_err("report worker phase")?;
    Ok(())
}
