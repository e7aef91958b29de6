//! Domain model for queued messages and consumer configuration.

mod error;
mod ids;
mod message;
mod options;

pub use error::{MessageCodecError, MessagingDomainError};
pub use ids::{ConsumerId, MessageId, QueueName};
pub use message::Message;
pub use options::ConsumerOptions;
