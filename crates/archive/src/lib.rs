//! Snapshot production and per-source rotation
//!
//! This crate provides:
//! - The snapshot producer (dump command piped through gzip)
//! - Backup directory layout checks
//! - The archiver, which produces then rotates each source in turn
//! - Human-readable byte sizes for log output

pub mod archiver;
pub mod layout;
pub mod producer;
pub mod size;

// Re-exports
pub use archiver::{Archiver, RotationSummary, RunReport, SourceOutcome, SourceStatus};
pub use producer::{DumpCommand, Producer};
pub use size::format_size;

/// Result type for archive operations
pub type Result<T> = anyhow::Result<T>;
