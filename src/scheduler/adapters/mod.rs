//! Cluster adapters.

pub mod memory;

pub use memory::InMemoryCluster;
