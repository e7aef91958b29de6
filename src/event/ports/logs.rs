//! Log store port for worker and job output.

use crate::event::domain::{Event, LogEntry, LogSource};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;
use thiserror::Error;

/// Result type for log store operations.
pub type LogStoreResult<T> = Result<T, LogStoreError>;

/// Stream of log lines; it ends when the container's output ends.
pub type LogStream = BoxStream<'static, LogEntry>;

/// Access to container output.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Returns all output written so far.
    async fn get_logs(&self, event: &Event, source: &LogSource) -> LogStoreResult<Vec<LogEntry>>;

    /// Streams output as it is written.
    async fn stream_logs(&self, event: &Event, source: &LogSource) -> LogStoreResult<LogStream>;
}

/// Errors returned by log store implementations.
#[derive(Debug, Clone, Error)]
pub enum LogStoreError {
    /// Persistence-layer failure.
    #[error("log store error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl LogStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
