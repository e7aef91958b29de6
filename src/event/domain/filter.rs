//! Criteria for listing events.

use super::{Event, WorkerPhase};
use crate::project::domain::ProjectId;

/// Event list criteria. An empty filter selects every event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventListFilter {
    project_id: Option<ProjectId>,
    worker_phases: Vec<WorkerPhase>,
}

impl EventListFilter {
    /// Creates a filter that selects every event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the list to one project.
    #[must_use]
    pub fn with_project(mut self, project_id: ProjectId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    /// Restricts the list to the given worker phases.
    #[must_use]
    pub fn with_worker_phases(mut self, phases: impl IntoIterator<Item = WorkerPhase>) -> Self {
        self.worker_phases = phases.into_iter().collect();
        self
    }

    /// Returns the project restriction.
    #[must_use]
    pub const fn project_id(&self) -> Option<&ProjectId> {
        self.project_id.as_ref()
    }

    /// Returns the phase restriction; empty means any phase.
    #[must_use]
    pub fn worker_phases(&self) -> &[WorkerPhase] {
        &self.worker_phases
    }

    /// Returns `true` when `event` satisfies the filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        let project_matches = self
            .project_id
            .as_ref()
            .is_none_or(|project_id| project_id == event.project_id());
        let phase_matches =
            self.worker_phases.is_empty() || self.worker_phases.contains(&event.worker_phase());
        project_matches && phase_matches
    }
}
