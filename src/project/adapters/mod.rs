//! Adapter implementations of the project store.

pub mod memory;
pub mod postgres;
