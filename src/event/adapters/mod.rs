//! Adapter implementations of the event and log stores.

pub mod memory;
pub mod postgres;
