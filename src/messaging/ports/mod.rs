//! Port contracts for the reliable queue.

pub mod broker;

pub use broker::{BrokerError, BrokerResult, MessageBroker, ReclaimScope, ReclaimedConsumer};
