//! Step definitions for event cancellation scenarios.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
