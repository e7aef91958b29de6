//! `PostgreSQL` adapters for project persistence.

mod models;
mod schema;
mod store;

pub use store::{PostgresProjectStore, ProjectPgPool};
