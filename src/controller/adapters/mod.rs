//! Controller API adapters.

pub mod service;

pub use service::ServiceControllerApi;
