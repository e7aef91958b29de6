//! Application services for event orchestration.

mod events;

pub use events::{
    CreateEventRequest, DEFAULT_CONFIG_FILES_DIRECTORY, DEFAULT_GIT_REF, DEFAULT_WORKSPACE_SIZE,
    EventsService, EventsServiceError, EventsServiceResult, SweepOutcome, resolve_worker,
};
