//! Translation of projects and events into cluster resources.
//!
//! The projects scheduler gives each project an isolated namespace with
//! RBAC for its workers and jobs plus a secret store. The events scheduler
//! writes each event's description and worker configuration as secrets in
//! that namespace and announces the event on the project's work queue.
//! Cluster access goes through the [`ports::ClusterApi`] seam.
//!
//! - Resource and selector types in [`domain`]
//! - Cluster and scheduler contracts in [`ports`]
//! - The in-memory cluster in [`adapters`]
//! - Cluster-backed schedulers in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
