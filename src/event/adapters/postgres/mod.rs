//! `PostgreSQL` adapters for event persistence.

mod models;
mod schema;
mod store;
mod transaction;

pub use store::{EventPgPool, PostgresEventStore};
