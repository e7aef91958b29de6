//! Unit tests for the event module.

mod domain_tests;
