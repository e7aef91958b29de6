//! Unit tests for the controller module.
