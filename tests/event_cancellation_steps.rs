//! Behaviour tests for phase-gated event cancellation.

#[path = "event_cancellation_steps/mod.rs"]
mod event_cancellation_steps_defs;

use event_cancellation_steps_defs::world::{CancellationWorld, world};
use rstest_bdd_macros::scenario;

#[scenario(
    path = "tests/features/event_cancellation.feature",
    name = "Cancel a pending event"
)]
#[tokio::test(flavor = "multi_thread")]
async fn cancel_pending_event(world: CancellationWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/event_cancellation.feature",
    name = "Leave a running event alone by default"
)]
#[tokio::test(flavor = "multi_thread")]
async fn running_event_needs_explicit_request(world: CancellationWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/event_cancellation.feature",
    name = "Abort a running event on request"
)]
#[tokio::test(flavor = "multi_thread")]
async fn abort_running_event(world: CancellationWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/event_cancellation.feature",
    name = "Finished events cannot be cancelled"
)]
#[tokio::test(flavor = "multi_thread")]
async fn finished_event_is_not_cancelled(world: CancellationWorld) {
    let _ = world;
}
