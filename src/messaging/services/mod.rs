//! Queue producer and consumer services.

mod consumer;
mod producer;

pub use consumer::{Consumer, ConsumerError, ConsumerResult, HandlerError, MessageHandler};
pub use producer::{Producer, ProducerError};
