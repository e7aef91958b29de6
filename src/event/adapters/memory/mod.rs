//! In-memory adapters for events and logs.

mod event;
mod logs;

pub use event::InMemoryEventStore;
pub use logs::InMemoryLogStore;
