//! Publishing side of the reliable queue.

use crate::messaging::{
    domain::{Message, QueueName},
    ports::{BrokerError, MessageBroker},
};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Error returned when a message could not be published.
#[derive(Debug, Error)]
#[error("failed to publish message {message_id} to queue {queue}")]
pub struct ProducerError {
    /// Queue the message was destined for.
    pub queue: QueueName,
    /// Identifier of the rejected message.
    pub message_id: crate::messaging::domain::MessageId,
    /// Underlying broker failure.
    #[source]
    pub source: BrokerError,
}

/// Publishes messages to one queue.
///
/// A successful publish means the message is durably stored; it may still be
/// delivered more than once.
pub struct Producer<B>
where
    B: MessageBroker + ?Sized,
{
    queue: QueueName,
    broker: Arc<B>,
}

impl<B> Producer<B>
where
    B: MessageBroker + ?Sized,
{
    /// Creates a producer for `queue`.
    #[must_use]
    pub const fn new(queue: QueueName, broker: Arc<B>) -> Self {
        Self { queue, broker }
    }

    /// Returns the queue this producer publishes to.
    #[must_use]
    pub const fn queue(&self) -> &QueueName {
        &self.queue
    }

    /// Publishes `message`, holding it back until its delivery time if it has
    /// one.
    ///
    /// # Errors
    ///
    /// Returns [`ProducerError`] on broker failure. Nothing is retried.
    pub async fn publish(&self, message: &Message) -> Result<(), ProducerError> {
        let outcome = match message.deliver_at() {
            Some(deliver_at) => {
                self.broker
                    .schedule(&self.queue, message, deliver_at)
                    .await
            }
            None => self.broker.enqueue(&self.queue, message).await,
        };
        outcome.map_err(|source| ProducerError {
            queue: self.queue.clone(),
            message_id: message.id(),
            source,
        })?;
        debug!(
            queue = %self.queue,
            message_id = %message.id(),
            delayed = message.deliver_at().is_some(),
            "published message"
        );
        Ok(())
    }
}
