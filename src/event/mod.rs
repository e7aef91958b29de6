//! Events: requests to run a worker for a project.
//!
//! The events service is the transactional core of the system. It fans
//! provider events out to subscribed projects, provisions scheduler
//! resources before persisting each event (compensating on failure), and
//! gates cancellation and deletion on the worker phase recorded in the
//! store.
//!
//! - Domain types in [`domain`]
//! - Event store, transaction, and log store contracts in [`ports`]
//! - In-memory and `PostgreSQL` adapters in [`adapters`]
//! - [`services::EventsService`] in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
