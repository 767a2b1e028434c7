//! Integration test suite.
//!
//! 1. End-to-end apply, revert and versioning workflows
//! 2. Condenser behaviour on generated change logs

pub mod condenser_tests;
pub mod end_to_end_tests;
pub mod helpers;
