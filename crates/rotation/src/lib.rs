//! Time-tiered retention for timestamped snapshot files
//!
//! This crate provides:
//! - Snapshot entries parsed from `<timestamp>.<extension>` file names
//! - Exponentially widening retention windows ("tapes")
//! - Directory scanning into newest-first entry sets
//! - The rotation scheduler (pure, no I/O)
//! - Purge execution with aggregated failures

pub mod entry;
pub mod error;
pub mod purge;
pub mod scan;
pub mod schedule;
pub mod series;

// Re-exports
pub use entry::{ListedFile, OrderedEntrySet, SnapshotEntry};
pub use error::{PurgeFailure, RotationError, TimestampError};
pub use purge::purge;
pub use scan::{list_dir, parse_created_at, scan};
pub use schedule::{schedule, RotationResult, Tape};
pub use series::TimeSeries;

/// Default file name timestamp format (chrono strftime syntax, always UTC)
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S_UTC";

/// Result type for rotation operations
pub type Result<T> = std::result::Result<T, RotationError>;
