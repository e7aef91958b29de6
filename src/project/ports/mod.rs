//! Port contracts for project persistence.

pub mod store;

pub use store::{ProjectStore, ProjectStoreError, ProjectStoreResult};
