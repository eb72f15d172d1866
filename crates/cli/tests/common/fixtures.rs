//! Backup root fixtures

use flate2::read::GzDecoder;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Snapshot name stamped at 2000-01-01, older than any default retention window
pub const ANCIENT_SNAPSHOT: &str = "2000-01-01_00-00-00_UTC.sql.gz";

/// A temporary working directory holding a backup root
pub struct BackupRoot {
    temp_dir: TempDir,
}

impl BackupRoot {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// Working directory for the command under test
    pub fn workdir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// The backup root itself (not created until asked)
    pub fn root(&self) -> PathBuf {
        self.temp_dir.path().join("bak")
    }

    pub fn source_dir(&self, source: &str) -> PathBuf {
        self.root().join(source)
    }

    /// Write a file into a source directory, creating it as needed
    pub fn seed(&self, source: &str, name: &str, contents: &[u8]) -> PathBuf {
        let dir = self.source_dir(source);
        fs::create_dir_all(&dir).expect("Failed to create source dir");
        let path = dir.join(name);
        fs::write(&path, contents).expect("Failed to seed file");
        path
    }

    /// Names of compressed snapshots in a source directory, sorted
    pub fn snapshots(&self, source: &str) -> Vec<String> {
        let mut names: Vec<String> = match fs::read_dir(self.source_dir(source)) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|name| name.ends_with(".sql.gz"))
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }

    /// Decompressed contents of a snapshot
    pub fn read_snapshot(&self, source: &str, name: &str) -> String {
        let file =
            fs::File::open(self.source_dir(source).join(name)).expect("Failed to open snapshot");
        let mut contents = String::new();
        GzDecoder::new(file)
            .read_to_string(&mut contents)
            .expect("Failed to decompress snapshot");
        contents
    }

    /// Write a config file into the working directory
    pub fn write_config(&self, contents: &str) -> PathBuf {
        let path = self.workdir().join("baktape.toml");
        fs::write(&path, contents).expect("Failed to write config");
        path
    }
}
