//! BrigNext: event-driven workload orchestration.
//!
//! This crate provides the event scheduling core of BrigNext: the
//! transactional pipeline that turns events into cluster resources and queued
//! work, the reliable Redis-backed queue that carries that work, and the
//! controller that provisions workers and waits for them to finish.
//!
//! # Architecture
//!
//! BrigNext follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (Redis, `PostgreSQL`,
//!   in-memory)
//! - **Services**: Orchestration over ports
//!
//! # Modules
//!
//! - [`messaging`]: Reliable queue producer and consumer
//! - [`project`]: Projects, worker defaults, and event subscriptions
//! - [`event`]: Events, worker and job status, and the events service
//! - [`scheduler`]: Translation of projects and events into cluster resources
//! - [`controller`]: Per-project queue consumers that run workers
//! - [`retry`] and [`saga`]: Shared failure-handling primitives

pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod messaging;
pub mod project;
pub mod retry;
pub mod saga;
pub mod scheduler;
pub mod telemetry;
