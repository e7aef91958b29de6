//! Redis broker adapter.
//!
//! Claiming uses `RPOPLPUSH`; acknowledgement is a `MULTI` pipeline;
//! scheduled promotion and dead-consumer reclamation are Lua scripts so each
//! runs atomically on the server.

mod broker;
mod keys;
mod scripts;

pub use broker::RedisBroker;
pub use keys::RedisKeys;
