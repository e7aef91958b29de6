//! Controller ports.

pub mod api;

#[cfg(test)]
pub use api::MockControllerApi;
pub use api::{ControllerApi, ControllerApiError, ControllerApiResult};
