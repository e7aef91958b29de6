//! Worker controller: runs one queue consumer per project and turns each
//! work message into a worker pod.
//!
//! [`services::Controller`] reconciles the set of running consumers against
//! the current projects at a fixed interval. Every consumer hands messages to
//! the shared [`services::WorkerManager`], which provisions a workspace claim
//! and a worker pod for pending events (bounded by a capacity semaphore) and
//! then polls the event until its worker reaches a terminal phase.
//!
//! - Workspace and pod builders in [`domain`]
//! - The [`ports::ControllerApi`] contract in [`ports`]
//! - A service-backed API in [`adapters`]
//! - [`services::Controller`] and [`services::WorkerManager`] in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
