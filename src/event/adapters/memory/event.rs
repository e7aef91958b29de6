//! In-memory event store for tests and single-process deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockWriteGuard};
use tokio::sync::OwnedMutexGuard;

use crate::event::{
    domain::{Event, EventId, EventListFilter, JobStatus, WorkerStatus},
    ports::{EventStore, EventStoreError, EventStoreResult, EventTransaction},
};

/// Thread-safe in-memory event store.
///
/// Transactions are serialized: [`EventStore::begin`] waits until the
/// previous transaction finishes. Transactional changes are applied at once
/// and undone on rollback, so readers outside the transaction may observe
/// them before commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventStore {
    state: Arc<RwLock<InMemoryEventState>>,
    tx_lock: Arc<tokio::sync::Mutex<()>>,
}

#[derive(Debug, Default)]
struct InMemoryEventState {
    events: HashMap<EventId, Event>,
    fail_creates: bool,
}

fn lock_error(err: impl ToString) -> EventStoreError {
    EventStoreError::persistence(std::io::Error::other(err.to_string()))
}

impl InMemoryEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent [`EventStore::create`] fail until cleared.
    ///
    /// # Errors
    ///
    /// Returns store errors when lock acquisition fails.
    pub fn fail_creates(&self, failing: bool) -> EventStoreResult<()> {
        self.write()?.fail_creates = failing;
        Ok(())
    }

    /// Returns the number of stored events.
    ///
    /// # Errors
    ///
    /// Returns store errors when lock acquisition fails.
    pub fn len(&self) -> EventStoreResult<usize> {
        Ok(self.state.read().map_err(lock_error)?.events.len())
    }

    /// Returns `true` when no events are stored.
    ///
    /// # Errors
    ///
    /// Returns store errors when lock acquisition fails.
    pub fn is_empty(&self) -> EventStoreResult<bool> {
        Ok(self.len()? == 0)
    }

    fn write(&self) -> EventStoreResult<RwLockWriteGuard<'_, InMemoryEventState>> {
        self.state.write().map_err(lock_error)
    }

    /// Applies a conditional change and returns the prior event when one
    /// was made.
    fn apply_cancel(
        &self,
        id: EventId,
        cancel_running: bool,
        at: DateTime<Utc>,
    ) -> EventStoreResult<Option<Event>> {
        let mut state = self.write()?;
        let Some(event) = state.events.get_mut(&id) else {
            return Ok(None);
        };
        let before = event.clone();
        Ok(event.cancel(cancel_running, at).then_some(before))
    }

    fn apply_delete(
        &self,
        id: EventId,
        delete_pending: bool,
        delete_running: bool,
    ) -> EventStoreResult<Option<Event>> {
        let mut state = self.write()?;
        let deletable = state
            .events
            .get(&id)
            .is_some_and(|event| event.is_deletable(delete_pending, delete_running));
        if !deletable {
            return Ok(None);
        }
        Ok(state.events.remove(&id))
    }

    fn restore(&self, id: EventId, before: Event) -> EventStoreResult<()> {
        self.write()?.events.insert(id, before);
        Ok(())
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn create(&self, event: &Event) -> EventStoreResult<()> {
        let mut state = self.write()?;
        if state.fail_creates {
            return Err(EventStoreError::persistence(std::io::Error::other(
                "injected create failure",
            )));
        }
        if state.events.contains_key(&event.id()) {
            return Err(EventStoreError::Duplicate(event.id()));
        }
        state.events.insert(event.id(), event.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: EventId) -> EventStoreResult<Option<Event>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.events.get(&id).cloned())
    }

    async fn list(&self, filter: &EventListFilter) -> EventStoreResult<Vec<Event>> {
        let state = self.state.read().map_err(lock_error)?;
        let mut events: Vec<Event> = state
            .events
            .values()
            .filter(|event| filter.matches(event))
            .cloned()
            .collect();
        events.sort_by(|left, right| {
            right
                .created()
                .cmp(&left.created())
                .then_with(|| left.id().cmp(&right.id()))
        });
        Ok(events)
    }

    async fn cancel(
        &self,
        id: EventId,
        cancel_running: bool,
        at: DateTime<Utc>,
    ) -> EventStoreResult<bool> {
        let _serialized = self.tx_lock.lock().await;
        Ok(self.apply_cancel(id, cancel_running, at)?.is_some())
    }

    async fn delete(
        &self,
        id: EventId,
        delete_pending: bool,
        delete_running: bool,
    ) -> EventStoreResult<bool> {
        let _serialized = self.tx_lock.lock().await;
        Ok(self
            .apply_delete(id, delete_pending, delete_running)?
            .is_some())
    }

    async fn update_worker_status(
        &self,
        id: EventId,
        status: &WorkerStatus,
    ) -> EventStoreResult<()> {
        let mut state = self.write()?;
        let event = state
            .events
            .get_mut(&id)
            .ok_or(EventStoreError::NotFound(id))?;
        event
            .replace_worker_status(status.clone())
            .map_err(EventStoreError::InvalidTransition)
    }

    async fn update_job_status(
        &self,
        id: EventId,
        job_name: &str,
        status: &JobStatus,
    ) -> EventStoreResult<()> {
        let mut state = self.write()?;
        let event = state
            .events
            .get_mut(&id)
            .ok_or(EventStoreError::NotFound(id))?;
        event.replace_job_status(job_name, status.clone());
        Ok(())
    }

    async fn begin(&self) -> EventStoreResult<Arc<dyn EventTransaction>> {
        let guard = Arc::clone(&self.tx_lock).lock_owned().await;
        Ok(Arc::new(InMemoryTransaction {
            store: self.clone(),
            guard: Mutex::new(Some(guard)),
            undo: Mutex::new(Vec::new()),
            finished: AtomicBool::new(false),
        }))
    }
}

struct InMemoryTransaction {
    store: InMemoryEventStore,
    guard: Mutex<Option<OwnedMutexGuard<()>>>,
    undo: Mutex<Vec<(EventId, Event)>>,
    finished: AtomicBool,
}

impl InMemoryTransaction {
    fn ensure_open(&self) -> EventStoreResult<()> {
        if self.finished.load(Ordering::Acquire) {
            return Err(EventStoreError::TransactionFinished);
        }
        Ok(())
    }

    fn record(&self, id: EventId, before: Event) -> EventStoreResult<()> {
        self.undo.lock().map_err(lock_error)?.push((id, before));
        Ok(())
    }

    fn take_undo(&self) -> EventStoreResult<Vec<(EventId, Event)>> {
        if self.finished.swap(true, Ordering::AcqRel) {
            return Err(EventStoreError::TransactionFinished);
        }
        Ok(std::mem::take(&mut *self.undo.lock().map_err(lock_error)?))
    }

    fn release(&self) -> EventStoreResult<()> {
        self.guard.lock().map_err(lock_error)?.take();
        Ok(())
    }
}

#[async_trait]
impl EventTransaction for InMemoryTransaction {
    async fn cancel(
        &self,
        id: EventId,
        cancel_running: bool,
        at: DateTime<Utc>,
    ) -> EventStoreResult<bool> {
        self.ensure_open()?;
        let Some(before) = self.store.apply_cancel(id, cancel_running, at)? else {
            return Ok(false);
        };
        self.record(id, before)?;
        Ok(true)
    }

    async fn delete(
        &self,
        id: EventId,
        delete_pending: bool,
        delete_running: bool,
    ) -> EventStoreResult<bool> {
        self.ensure_open()?;
        let Some(before) = self
            .store
            .apply_delete(id, delete_pending, delete_running)?
        else {
            return Ok(false);
        };
        self.record(id, before)?;
        Ok(true)
    }

    async fn commit(&self) -> EventStoreResult<()> {
        self.take_undo()?;
        self.release()
    }

    async fn rollback(&self) -> EventStoreResult<()> {
        let undo = self.take_undo()?;
        let restored = undo
            .into_iter()
            .rev()
            .try_for_each(|(id, before)| self.store.restore(id, before));
        self.release()?;
        restored
    }
}
