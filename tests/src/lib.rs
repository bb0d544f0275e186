//! Shared helpers for the HTTP integration tests.

pub mod fixtures;
pub mod mocks;
