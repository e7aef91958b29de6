//! Broker adapters.

pub mod memory;
pub mod redis;

pub use memory::InMemoryBroker;
pub use redis::{RedisBroker, RedisKeys};
