//! Snapshot entry data structures

use chrono::{DateTime, Duration, Utc};

/// A regular file as reported by a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedFile {
    /// File name (no directory component)
    pub name: String,
    /// Size in bytes
    pub size: u64,
}

impl ListedFile {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// A snapshot file whose creation time was parsed from its name
///
/// The timestamp comes from the file name rather than the filesystem, so it
/// survives copies and restores unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotEntry {
    name: String,
    size: u64,
    created_at: DateTime<Utc>,
}

impl SnapshotEntry {
    /// Create a new entry
    pub fn new(name: impl Into<String>, size: u64, created_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            size,
            created_at,
        }
    }

    /// File name within the snapshot directory
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Creation time parsed from the file name
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Age relative to `now` (negative for future-dated entries)
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.created_at)
    }
}

/// Snapshot entries sorted newest-first
///
/// Entries sharing a timestamp keep the order they were supplied in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedEntrySet {
    entries: Vec<SnapshotEntry>,
}

impl OrderedEntrySet {
    /// Sort arbitrary entries into a newest-first set
    pub fn from_unordered(mut entries: Vec<SnapshotEntry>) -> Self {
        // Stable: ties keep listing order
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Self { entries }
    }

    pub fn as_slice(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SnapshotEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total size of all entries in bytes
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(SnapshotEntry::size).sum()
    }

    pub fn into_vec(self) -> Vec<SnapshotEntry> {
        self.entries
    }
}

impl FromIterator<SnapshotEntry> for OrderedEntrySet {
    fn from_iter<I: IntoIterator<Item = SnapshotEntry>>(iter: I) -> Self {
        Self::from_unordered(iter.into_iter().collect())
    }
}

impl IntoIterator for OrderedEntrySet {
    type Item = SnapshotEntry;
    type IntoIter = std::vec::IntoIter<SnapshotEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a OrderedEntrySet {
    type Item = &'a SnapshotEntry;
    type IntoIter = std::slice::Iter<'a, SnapshotEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
