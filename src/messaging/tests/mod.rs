//! Unit tests for the reliable queue.

mod broker_tests;
mod consumer_tests;
