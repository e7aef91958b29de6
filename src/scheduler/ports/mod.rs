//! Port contracts for cluster access and scheduling.

pub mod cluster;
pub mod schedulers;

pub use cluster::{ClusterApi, ClusterError, ClusterResult};
#[cfg(test)]
pub use schedulers::{MockEventsScheduler, MockProjectsScheduler};
pub use schedulers::{EventsScheduler, ProjectsScheduler, SchedulerError, SchedulerResult};
