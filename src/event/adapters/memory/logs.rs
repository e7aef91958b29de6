//! In-memory log store.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::event::{
    domain::{Event, EventId, LogEntry, LogSource},
    ports::{LogStore, LogStoreError, LogStoreResult, LogStream},
};

/// Log store backed by a map of captured lines.
///
/// Streams yield the lines captured so far and then end.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLogStore {
    lines: Arc<RwLock<HashMap<(EventId, LogSource), Vec<LogEntry>>>>,
}

impl InMemoryLogStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one line of output.
    ///
    /// # Errors
    ///
    /// Returns store errors when lock acquisition fails.
    pub fn append(
        &self,
        event_id: EventId,
        source: LogSource,
        entry: LogEntry,
    ) -> LogStoreResult<()> {
        self.lines
            .write()
            .map_err(|err| LogStoreError::persistence(std::io::Error::other(err.to_string())))?
            .entry((event_id, source))
            .or_default()
            .push(entry);
        Ok(())
    }

    fn snapshot(&self, event: &Event, source: &LogSource) -> LogStoreResult<Vec<LogEntry>> {
        let lines = self
            .lines
            .read()
            .map_err(|err| LogStoreError::persistence(std::io::Error::other(err.to_string())))?;
        Ok(lines
            .get(&(event.id(), source.clone()))
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl LogStore for InMemoryLogStore {
    async fn get_logs(&self, event: &Event, source: &LogSource) -> LogStoreResult<Vec<LogEntry>> {
        self.snapshot(event, source)
    }

    async fn stream_logs(&self, event: &Event, source: &LogSource) -> LogStoreResult<LogStream> {
        Ok(stream::iter(self.snapshot(event, source)?).boxed())
    }
}
