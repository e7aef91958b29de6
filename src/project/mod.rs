//! Projects: the owners of events, worker defaults, and event subscriptions.
//!
//! A project carries the worker template every event inherits and the
//! subscriptions used to fan provider events out to interested projects.
//! Its cluster-side resources are provisioned by the
//! [`ProjectsScheduler`](crate::scheduler::ports::ProjectsScheduler).
//!
//! - Domain types in [`domain`]
//! - The store contract in [`ports`]
//! - In-memory and `PostgreSQL` stores in [`adapters`]
//! - [`services::ProjectsService`] in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
