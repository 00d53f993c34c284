//! Shared utilities: error types and logging initialization.

pub mod error;
pub mod logging;
