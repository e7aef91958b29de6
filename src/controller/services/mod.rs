//! Controller services.

mod controller;
mod worker_manager;

pub use controller::{
    CONSUMER_HANDLERS, CONSUMER_RECEIVERS, Controller, ControllerError, ControllerResult,
    project_consumer_options,
};
pub use worker_manager::{
    DEFAULT_LOOKUP_ATTEMPTS, DEFAULT_LOOKUP_MAX_BACKOFF, WorkerManager, WorkerManagerError,
};
