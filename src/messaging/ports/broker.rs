//! Broker port: the durable structures behind a reliable queue.
//!
//! Each queue owns a pending list, a message body store, a scheduled set
//! ordered by delivery time, a consumer registry of last heartbeats, and one
//! claimed list per consumer. Implementations must make claiming, promotion,
//! acknowledgement, and reclamation atomic with respect to each other.

use crate::messaging::domain::{ConsumerId, Message, MessageId, QueueName};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Which registered consumers a reclamation pass applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReclaimScope {
    /// Consumers whose last heartbeat is older than the given instant.
    StaleSince(DateTime<Utc>),
    /// Every registered consumer.
    All,
}

/// Outcome of reclaiming one consumer's claimed messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReclaimedConsumer {
    /// The consumer whose registration was removed.
    pub consumer: ConsumerId,
    /// Number of message IDs moved back to the pending list.
    pub requeued: usize,
}

/// Storage operations backing a reliable queue.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Stores the message and appends its ID to the pending list.
    async fn enqueue(&self, queue: &QueueName, message: &Message) -> BrokerResult<()>;

    /// Stores the message and holds its ID until `deliver_at`.
    async fn schedule(
        &self,
        queue: &QueueName,
        message: &Message,
        deliver_at: DateTime<Utc>,
    ) -> BrokerResult<()>;

    /// Moves every scheduled ID due at or before `now` to the pending list.
    ///
    /// Returns the number of promoted messages. Promoting twice never
    /// duplicates a message.
    async fn promote_due(&self, queue: &QueueName, now: DateTime<Utc>) -> BrokerResult<usize>;

    /// Atomically moves the next pending ID into `consumer`'s claimed list.
    ///
    /// Returns `None` when the pending list is empty.
    async fn claim_next(
        &self,
        queue: &QueueName,
        consumer: ConsumerId,
    ) -> BrokerResult<Option<MessageId>>;

    /// Loads the stored envelope bytes of a message.
    ///
    /// Returns `None` when no body is stored under `id`.
    async fn load(&self, queue: &QueueName, id: MessageId) -> BrokerResult<Option<Vec<u8>>>;

    /// Atomically removes `id` from `consumer`'s claimed list and deletes its
    /// body.
    async fn acknowledge(
        &self,
        queue: &QueueName,
        consumer: ConsumerId,
        id: MessageId,
    ) -> BrokerResult<()>;

    /// Records `now` as the last sign of life of `consumer`.
    async fn heartbeat(
        &self,
        queue: &QueueName,
        consumer: ConsumerId,
        now: DateTime<Utc>,
    ) -> BrokerResult<()>;

    /// Atomically returns the claimed messages of every consumer in `scope`
    /// to the pending list and removes their registrations.
    async fn reclaim(
        &self,
        queue: &QueueName,
        scope: ReclaimScope,
    ) -> BrokerResult<Vec<ReclaimedConsumer>>;
}

/// Errors returned by broker implementations.
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    /// Stored data could not be interpreted.
    #[error("corrupt queue data: {0}")]
    Corrupt(String),

    /// The backing store failed.
    #[error("broker backend error: {0}")]
    Backend(Arc<dyn std::error::Error + Send + Sync>),
}

impl BrokerError {
    /// Wraps a backend error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Arc::new(err))
    }
}
