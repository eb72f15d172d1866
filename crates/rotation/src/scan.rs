//! Directory scanning into newest-first snapshot entries
//!
//! Snapshot files are named `<timestamp>.<extension>`. Everything before the
//! first `.` is parsed with the configured chrono format. Files whose names
//! do not parse are logged and skipped; they are never deleted by rotation.

use crate::entry::{ListedFile, OrderedEntrySet, SnapshotEntry};
use crate::error::{RotationError, TimestampError};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::path::Path;
use tracing::{debug, warn};

/// Read a directory into a listing of regular files
///
/// Symlinks are not followed and are skipped like any other non-file entry.
/// An entry that cannot be inspected is logged and left out; only failing to
/// read the directory itself is an error.
///
/// The listing is sorted by file name so that scanning (and therefore
/// tie-breaking between equal timestamps) does not depend on the platform's
/// directory order.
pub fn list_dir(path: &Path) -> Result<Vec<ListedFile>, RotationError> {
    let entries = std::fs::read_dir(path).map_err(|source| RotationError::ListDir {
        path: path.to_path_buf(),
        source,
    })?;

    let mut listing = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", path.display(), e);
                continue;
            }
        };
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };

        if !metadata.is_file() {
            debug!("Skipping non-file entry {}", entry.path().display());
            continue;
        }

        match entry.file_name().into_string() {
            Ok(name) => listing.push(ListedFile::new(name, metadata.len())),
            Err(raw) => warn!("Skipping file with non UTF-8 name {:?}", raw),
        }
    }

    listing.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(listing)
}

/// Parse the creation time out of a snapshot file name
///
/// Formats carrying an offset (`%z`) are honored; otherwise the timestamp is
/// read as UTC.
pub fn parse_created_at(name: &str, time_format: &str) -> Result<DateTime<Utc>, TimestampError> {
    let (stamp, _extension) = name
        .split_once('.')
        .ok_or(TimestampError::MissingExtension)?;

    if let Ok(with_offset) = DateTime::parse_from_str(stamp, time_format) {
        return Ok(with_offset.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(stamp, time_format)?;
    Ok(Utc.from_utc_datetime(&naive))
}

/// Parse a directory listing into a newest-first entry set
pub fn scan<I>(listing: I, time_format: &str, now: DateTime<Utc>) -> OrderedEntrySet
where
    I: IntoIterator<Item = ListedFile>,
{
    let mut entries = Vec::new();

    for file in listing {
        match parse_created_at(&file.name, time_format) {
            Ok(created_at) => {
                if created_at > now {
                    warn!("Backup {:?} is dated in the future ({})", file.name, created_at);
                }
                entries.push(SnapshotEntry::new(file.name, file.size, created_at));
            }
            Err(e) => {
                warn!("Failed to parse time of backup from filename {:?}: {}", file.name, e);
            }
        }
    }

    OrderedEntrySet::from_unordered(entries)
}
