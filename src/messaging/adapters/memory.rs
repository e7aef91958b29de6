//! In-memory broker for tests and single-process deployments.

use crate::messaging::{
    domain::{ConsumerId, Message, MessageId, QueueName},
    ports::{BrokerError, BrokerResult, MessageBroker, ReclaimScope, ReclaimedConsumer},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock, RwLockWriteGuard};

/// Thread-safe in-memory broker.
///
/// Lists are oriented like the Redis adapter: new IDs enter at the front and
/// are claimed from the back.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<RwLock<InMemoryBrokerState>>,
}

#[derive(Debug, Default)]
struct InMemoryBrokerState {
    queues: HashMap<QueueName, QueueState>,
    unavailable: bool,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<MessageId>,
    messages: HashMap<MessageId, Vec<u8>>,
    scheduled: Vec<(DateTime<Utc>, MessageId)>,
    consumers: HashMap<ConsumerId, DateTime<Utc>>,
    claimed: HashMap<ConsumerId, VecDeque<MessageId>>,
}

impl InMemoryBroker {
    /// Creates an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail until called with `false`.
    ///
    /// # Errors
    ///
    /// Returns broker errors when lock acquisition fails.
    pub fn set_unavailable(&self, unavailable: bool) -> BrokerResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|err| BrokerError::backend(std::io::Error::other(err.to_string())))?;
        state.unavailable = unavailable;
        Ok(())
    }

    /// Returns the pending IDs of `queue`, next-to-claim last.
    ///
    /// # Errors
    ///
    /// Returns broker errors when lock acquisition fails.
    pub fn pending(&self, queue: &QueueName) -> BrokerResult<Vec<MessageId>> {
        self.inspect(queue, |queue_state| {
            queue_state.pending.iter().copied().collect()
        })
    }

    /// Returns the IDs currently claimed by `consumer`.
    ///
    /// # Errors
    ///
    /// Returns broker errors when lock acquisition fails.
    pub fn claimed_by(
        &self,
        queue: &QueueName,
        consumer: ConsumerId,
    ) -> BrokerResult<Vec<MessageId>> {
        self.inspect(queue, |queue_state| {
            queue_state
                .claimed
                .get(&consumer)
                .map(|ids| ids.iter().copied().collect())
                .unwrap_or_default()
        })
    }

    /// Returns the number of stored message bodies in `queue`.
    ///
    /// # Errors
    ///
    /// Returns broker errors when lock acquisition fails.
    pub fn stored_messages(&self, queue: &QueueName) -> BrokerResult<usize> {
        self.inspect(queue, |queue_state| queue_state.messages.len())
    }

    /// Returns the number of scheduled messages in `queue`.
    ///
    /// # Errors
    ///
    /// Returns broker errors when lock acquisition fails.
    pub fn scheduled_len(&self, queue: &QueueName) -> BrokerResult<usize> {
        self.inspect(queue, |queue_state| queue_state.scheduled.len())
    }

    /// Returns the last heartbeat recorded for `consumer`.
    ///
    /// # Errors
    ///
    /// Returns broker errors when lock acquisition fails.
    pub fn last_heartbeat(
        &self,
        queue: &QueueName,
        consumer: ConsumerId,
    ) -> BrokerResult<Option<DateTime<Utc>>> {
        self.inspect(queue, |queue_state| {
            queue_state.consumers.get(&consumer).copied()
        })
    }

    fn inspect<T>(
        &self,
        queue: &QueueName,
        read: impl FnOnce(&QueueState) -> T,
    ) -> BrokerResult<T>
    where
        T: Default,
    {
        let state = self
            .state
            .read()
            .map_err(|err| BrokerError::backend(std::io::Error::other(err.to_string())))?;
        Ok(state.queues.get(queue).map(read).unwrap_or_default())
    }

    fn write(&self) -> BrokerResult<RwLockWriteGuard<'_, InMemoryBrokerState>> {
        let state = self
            .state
            .write()
            .map_err(|err| BrokerError::backend(std::io::Error::other(err.to_string())))?;
        if state.unavailable {
            return Err(BrokerError::backend(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "broker unavailable",
            )));
        }
        Ok(state)
    }
}

fn requeue(queue_state: &mut QueueState, consumer: ConsumerId) -> ReclaimedConsumer {
    let mut requeued = 0;
    if let Some(mut ids) = queue_state.claimed.remove(&consumer) {
        // Oldest claims sit at the back and must be claimed again first.
        while let Some(id) = ids.pop_front() {
            queue_state.pending.push_back(id);
            requeued += 1;
        }
    }
    queue_state.consumers.remove(&consumer);
    ReclaimedConsumer { consumer, requeued }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn enqueue(&self, queue: &QueueName, message: &Message) -> BrokerResult<()> {
        let envelope = message
            .to_json()
            .map_err(|err| BrokerError::Corrupt(err.to_string()))?;
        let mut state = self.write()?;
        let queue_state = state.queues.entry(queue.clone()).or_default();
        queue_state.messages.insert(message.id(), envelope);
        queue_state.pending.push_front(message.id());
        Ok(())
    }

    async fn schedule(
        &self,
        queue: &QueueName,
        message: &Message,
        deliver_at: DateTime<Utc>,
    ) -> BrokerResult<()> {
        let envelope = message
            .to_json()
            .map_err(|err| BrokerError::Corrupt(err.to_string()))?;
        let mut state = self.write()?;
        let queue_state = state.queues.entry(queue.clone()).or_default();
        queue_state.messages.insert(message.id(), envelope);
        queue_state
            .scheduled
            .retain(|(_, scheduled_id)| *scheduled_id != message.id());
        queue_state.scheduled.push((deliver_at, message.id()));
        Ok(())
    }

    async fn promote_due(&self, queue: &QueueName, now: DateTime<Utc>) -> BrokerResult<usize> {
        let mut state = self.write()?;
        let Some(queue_state) = state.queues.get_mut(queue) else {
            return Ok(0);
        };
        queue_state.scheduled.sort();
        let due_count = queue_state
            .scheduled
            .iter()
            .take_while(|(deliver_at, _)| *deliver_at <= now)
            .count();
        let due: Vec<_> = queue_state.scheduled.drain(..due_count).collect();
        for (_, id) in &due {
            queue_state.pending.push_front(*id);
        }
        Ok(due.len())
    }

    async fn claim_next(
        &self,
        queue: &QueueName,
        consumer: ConsumerId,
    ) -> BrokerResult<Option<MessageId>> {
        let mut state = self.write()?;
        let Some(queue_state) = state.queues.get_mut(queue) else {
            return Ok(None);
        };
        let Some(id) = queue_state.pending.pop_back() else {
            return Ok(None);
        };
        queue_state.claimed.entry(consumer).or_default().push_front(id);
        Ok(Some(id))
    }

    async fn load(&self, queue: &QueueName, id: MessageId) -> BrokerResult<Option<Vec<u8>>> {
        let state = self.write()?;
        Ok(state
            .queues
            .get(queue)
            .and_then(|queue_state| queue_state.messages.get(&id))
            .cloned())
    }

    async fn acknowledge(
        &self,
        queue: &QueueName,
        consumer: ConsumerId,
        id: MessageId,
    ) -> BrokerResult<()> {
        let mut state = self.write()?;
        let Some(queue_state) = state.queues.get_mut(queue) else {
            return Ok(());
        };
        if let Some(ids) = queue_state.claimed.get_mut(&consumer) {
            if let Some(position) = ids.iter().rposition(|claimed| *claimed == id) {
                ids.remove(position);
            }
        }
        queue_state.messages.remove(&id);
        Ok(())
    }

    async fn heartbeat(
        &self,
        queue: &QueueName,
        consumer: ConsumerId,
        now: DateTime<Utc>,
    ) -> BrokerResult<()> {
        let mut state = self.write()?;
        state
            .queues
            .entry(queue.clone())
            .or_default()
            .consumers
            .insert(consumer, now);
        Ok(())
    }

    async fn reclaim(
        &self,
        queue: &QueueName,
        scope: ReclaimScope,
    ) -> BrokerResult<Vec<ReclaimedConsumer>> {
        let mut state = self.write()?;
        let Some(queue_state) = state.queues.get_mut(queue) else {
            return Ok(Vec::new());
        };
        let mut targets: Vec<ConsumerId> = queue_state
            .consumers
            .iter()
            .filter(|(_, last_seen)| match scope {
                ReclaimScope::StaleSince(cutoff) => **last_seen < cutoff,
                ReclaimScope::All => true,
            })
            .map(|(consumer, _)| *consumer)
            .collect();
        targets.sort();
        Ok(targets
            .into_iter()
            .map(|consumer| requeue(queue_state, consumer))
            .collect())
    }
}
