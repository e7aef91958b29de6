//! When steps for event cancellation BDD scenarios.

use super::world::{CancellationWorld, run_async};
use rstest_bdd_macros::when;

fn cancel(world: &mut CancellationWorld, cancel_running: bool) -> Result<(), eyre::Report> {
    let id = world.event()?.id();
    world.last_cancel_result = Some(run_async(world.events.cancel(id, cancel_running)));
    Ok(())
}

#[when("the event is cancelled without cancelling running workers")]
fn cancel_pending_only(world: &mut CancellationWorld) -> Result<(), eyre::Report> {
    cancel(world, false)
}

#[when("the event is cancelled including running workers")]
fn cancel_including_running(world: &mut CancellationWorld) -> Result<(), eyre::Report> {
    cancel(world, true)
}
