//! Domain model for events and their worker and job status.

mod error;
mod event;
mod filter;
mod ids;
mod log;
mod phase;
mod status;

pub use error::{EventDomainError, ParseJobPhaseError, ParseWorkerPhaseError};
pub use event::{Event, EventDetails, EventGitConfig, PersistedEventData};
pub use filter::EventListFilter;
pub use ids::EventId;
pub use log::{LogEntry, LogSource};
pub use phase::{JobPhase, WorkerPhase};
pub use status::{EventStatus, JobStatus, WorkerStatus};
