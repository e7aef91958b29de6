//! Cluster-backed scheduler implementations.

mod events;
mod projects;

pub use events::ClusterEventsScheduler;
pub use projects::{ClusterProjectsScheduler, NAMESPACE_TOKEN_LENGTH};
