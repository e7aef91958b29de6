//! Port contracts for event persistence and worker logs.

pub mod logs;
pub mod store;

pub use logs::{LogStore, LogStoreError, LogStoreResult, LogStream};
pub use store::{EventStore, EventStoreError, EventStoreResult, EventTransaction, do_tx};
