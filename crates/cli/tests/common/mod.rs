//! Common utilities for integration tests

pub mod cli;
pub mod fixtures;

// Re-export commonly used items
pub use cli::{BakCommand, CommandResult};
pub use fixtures::BackupRoot;
