//! Then steps for event cancellation BDD scenarios.

use super::world::{CancellationWorld, run_async};
use brignext::event::domain::WorkerPhase;
use brignext::scheduler::{
    domain::{ResourceKind, event_secret_name, worker_secret_name},
    ports::ClusterApi,
};
use eyre::WrapErr;
use rstest_bdd_macros::then;

fn matched(world: &CancellationWorld) -> Result<bool, eyre::Report> {
    match world.last_cancel_result.as_ref() {
        Some(Ok(matched)) => Ok(*matched),
        Some(Err(err)) => Err(eyre::eyre!("cancellation failed: {err}")),
        None => Err(eyre::eyre!("missing cancellation result")),
    }
}

fn secret_exists(world: &CancellationWorld, name: &str) -> Result<bool, eyre::Report> {
    let namespace = world
        .event()?
        .namespace()
        .ok_or_else(|| eyre::eyre!("event was never scheduled"))?
        .to_owned();
    let secret = run_async(world.cluster.get(ResourceKind::Secret, &namespace, name))
        .wrap_err("read secret")?;
    Ok(secret.is_some())
}

#[then("the cancellation matched")]
fn cancellation_matched(world: &CancellationWorld) -> Result<(), eyre::Report> {
    if !matched(world)? {
        return Err(eyre::eyre!("expected the cancellation to match"));
    }
    Ok(())
}

#[then("the cancellation did not match")]
fn cancellation_did_not_match(world: &CancellationWorld) -> Result<(), eyre::Report> {
    if matched(world)? {
        return Err(eyre::eyre!("expected the cancellation not to match"));
    }
    Ok(())
}

#[then(r#"the event phase is "{phase}""#)]
fn event_phase_is(world: &CancellationWorld, phase: String) -> Result<(), eyre::Report> {
    let expected = WorkerPhase::try_from(phase.as_str())
        .map_err(|err| eyre::eyre!("invalid expected phase in scenario: {err}"))?;
    let event = run_async(world.events.get(world.event()?.id())).wrap_err("read event")?;

    if event.worker_phase() != expected {
        return Err(eyre::eyre!(
            "expected phase {expected}, found {}",
            event.worker_phase()
        ));
    }
    Ok(())
}

#[then("the worker configuration of the event is removed")]
fn worker_configuration_removed(world: &CancellationWorld) -> Result<(), eyre::Report> {
    if secret_exists(world, &worker_secret_name(world.event()?.id()))? {
        return Err(eyre::eyre!("worker configuration secret still exists"));
    }
    Ok(())
}

#[then("the worker configuration of the event is kept")]
fn worker_configuration_kept(world: &CancellationWorld) -> Result<(), eyre::Report> {
    if !secret_exists(world, &worker_secret_name(world.event()?.id()))? {
        return Err(eyre::eyre!("worker configuration secret was removed"));
    }
    Ok(())
}

#[then("the event description is kept")]
fn event_description_kept(world: &CancellationWorld) -> Result<(), eyre::Report> {
    if !secret_exists(world, &event_secret_name(world.event()?.id()))? {
        return Err(eyre::eyre!("event description secret was removed"));
    }
    Ok(())
}
