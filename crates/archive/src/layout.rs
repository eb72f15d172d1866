//! Backup directory layout
//!
//! ```text
//! <root>/
//!   <source>/
//!     2000-01-01_00-00-00_UTC.sql.gz
//!     ...
//! ```
//!
//! Every check here runs before any source is processed; a failure aborts
//! the whole run.

use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::info;

/// Make sure the backup root exists and is a directory
///
/// With `create_parents`, missing directories are created first.
pub fn prepare_root(root: &Path, create_parents: bool) -> Result<()> {
    if create_parents {
        fs::create_dir_all(root).with_context(|| {
            format!("Failed to initialize root backup directory {}", root.display())
        })?;
    }

    let metadata = fs::metadata(root)
        .with_context(|| format!("Could not verify backup path {}", root.display()))?;
    if !metadata.is_dir() {
        anyhow::bail!("Backup path must be a directory: {}", root.display());
    }

    Ok(())
}

/// Reject source names that are not a single plain path component
pub fn validate_source_name(source: &str) -> Result<()> {
    let mut components = Path::new(source).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) if name == OsStr::new(source) => Ok(()),
        _ => anyhow::bail!("Invalid source name {:?}: must be a plain directory name", source),
    }
}

/// Make sure `<root>/<source>` exists, creating it when missing
pub fn prepare_source_dir(root: &Path, source: &str) -> Result<PathBuf> {
    validate_source_name(source)?;

    let dir = root.join(source);
    if dir.is_dir() {
        return Ok(dir);
    }

    fs::create_dir(&dir)
        .with_context(|| format!("Error initializing archive directory for {:?}", source))?;
    info!("Created archive directory {}", dir.display());

    Ok(dir)
}
