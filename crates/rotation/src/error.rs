//! Rotation error types

use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Errors raised while building a time series, scanning, or purging
#[derive(Debug, thiserror::Error)]
pub enum RotationError {
    #[error("retention quota must be at least one bucket")]
    ZeroQuota,

    #[error("retention windows must be non-zero")]
    ZeroInterval,

    #[error("hot window ({hot_window:?}) exceeds the base interval ({base_interval:?})")]
    HotWindowExceedsBase {
        hot_window: Duration,
        base_interval: Duration,
    },

    #[error("retention window {index} overflows the representable duration")]
    SeriesOverflow { index: usize },

    #[error("failed to list directory {}", .path.display())]
    ListDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "unable to remove all excess backups ({} failed, {} removed)",
        .failed.len(),
        .removed
    )]
    IncompletePurge {
        removed: usize,
        failed: Vec<PurgeFailure>,
    },
}

/// A single file the purge executor could not remove
#[derive(Debug)]
pub struct PurgeFailure {
    /// File name within the purged directory
    pub name: String,
    /// Error reported by the filesystem
    pub error: io::Error,
}

/// Why a file name did not yield a snapshot timestamp
#[derive(Debug, thiserror::Error)]
pub enum TimestampError {
    #[error("file name has no extension separator")]
    MissingExtension,

    #[error(transparent)]
    Parse(#[from] chrono::ParseError),
}
