//! Reliable message queue for per-project work delivery.
//!
//! Messages are opaque byte payloads published to a named queue and
//! delivered at least once to a consumer's handler. A consumer claims each
//! message into its own active list before handling it, refreshes a
//! heartbeat while alive, and reclaims the active lists of consumers whose
//! heartbeats have lapsed. Delayed messages wait in a scheduled set until a
//! promoter moves them to the pending list.
//!
//! - Domain types in [`domain`]
//! - The broker contract in [`ports`]
//! - Redis and in-memory brokers in [`adapters`]
//! - [`services::Producer`] and [`services::Consumer`] in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
