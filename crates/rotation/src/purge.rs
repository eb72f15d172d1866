//! Purge execution
//!
//! Deletes scheduled snapshot files. A failed deletion is logged and
//! collected; the remaining files are still attempted, and a single
//! aggregate error is returned at the end.

use crate::entry::SnapshotEntry;
use crate::error::{PurgeFailure, RotationError};
use std::path::Path;
use tracing::{info, warn};

/// Remove every entry's file from `directory`
///
/// Returns the number of files removed, or `RotationError::IncompletePurge`
/// if at least one removal failed.
pub fn purge(directory: &Path, entries: &[SnapshotEntry]) -> Result<usize, RotationError> {
    if entries.is_empty() {
        info!("Nothing to remove");
        return Ok(0);
    }

    info!("Backups staged for removal:");

    let mut removed = 0;
    let mut failed = Vec::new();

    for entry in entries {
        info!("- {}", entry.name());

        match std::fs::remove_file(directory.join(entry.name())) {
            Ok(()) => removed += 1,
            Err(error) => {
                warn!("  - failed ({})", error);
                failed.push(PurgeFailure {
                    name: entry.name().to_string(),
                    error,
                });
            }
        }
    }

    if failed.is_empty() {
        Ok(removed)
    } else {
        Err(RotationError::IncompletePurge { removed, failed })
    }
}
