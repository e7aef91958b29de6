//! Unit tests for the scheduler module.
