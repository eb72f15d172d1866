//! Configuration file loading and merging with CLI flags
//!
//! Example `baktape.toml`:
//!
//! ```toml
//! base_dir = "/var/bak/mysql"
//! databases = ["shop", "wiki"]
//!
//! [rotation]
//! quota = 12
//! hot_window_secs = 300
//! base_interval_secs = 3600
//!
//! [dump]
//! command = "mysqldump"
//! args = ["--single-transaction"]
//! timeout_secs = 3600
//!
//! [mailgun]
//! api_key = "key-..."
//! domain = "mg.example.com"
//! sender = "Backups"
//! mail_to = "ops@example.com"
//! ```

use anyhow::{Context, Result};
use archive::producer::{DEFAULT_DUMP_PROGRAM, DEFAULT_EXTENSION};
use archive::{DumpCommand, Producer};
use chrono::format::{Item, StrftimeItems};
use chrono::{TimeZone, Utc};
use rotation::series::{DEFAULT_BASE_INTERVAL, DEFAULT_HOT_WINDOW, DEFAULT_QUOTA};
use rotation::{parse_created_at, TimeSeries, DEFAULT_TIME_FORMAT};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Backup root used when neither the CLI nor the config file names one
pub const DEFAULT_BACKUP_PATH: &str = "/var/bak/mysql";

/// Default notification subject
pub const DEFAULT_SUBJECT: &str = "MySQL Backup";

/// Default Mailgun API base URL
pub const DEFAULT_MAILGUN_API: &str = "https://api.mailgun.net/v3";

/// Contents of the TOML config file
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Backup root directory
    pub base_dir: Option<PathBuf>,
    /// Sources to back up
    #[serde(alias = "sources")]
    pub databases: Vec<String>,
    pub rotation: RotationConfig,
    pub dump: DumpConfig,
    /// Completion report settings (disabled when absent)
    pub mailgun: Option<MailgunConfig>,
}

/// `[rotation]` section
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RotationConfig {
    pub quota: usize,
    pub hot_window_secs: u64,
    pub base_interval_secs: u64,
    pub time_format: String,
    pub extension: String,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            quota: DEFAULT_QUOTA,
            hot_window_secs: DEFAULT_HOT_WINDOW.as_secs(),
            base_interval_secs: DEFAULT_BASE_INTERVAL.as_secs(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

/// `[dump]` section
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DumpConfig {
    pub command: String,
    pub args: Vec<String>,
    pub timeout_secs: Option<u64>,
    pub compression_level: u32,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_DUMP_PROGRAM.to_string(),
            args: Vec::new(),
            timeout_secs: None,
            compression_level: 6,
        }
    }
}

/// `[mailgun]` section
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MailgunConfig {
    #[serde(deserialize_with = "deserialize_secret")]
    pub api_key: SecretString,
    pub domain: String,
    pub sender: String,
    pub mail_to: String,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn deserialize_secret<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

fn default_subject() -> String {
    DEFAULT_SUBJECT.to_string()
}

fn default_api_base() -> String {
    DEFAULT_MAILGUN_API.to_string()
}

/// Load a config file
pub fn load(path: &Path) -> Result<FileConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("No config file found at {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// Values given on the command line; each one wins over the config file
#[derive(Debug, Default)]
pub struct Overrides {
    pub sources: Vec<String>,
    pub backup_path: Option<PathBuf>,
    pub dump_cmd: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Fully resolved run settings
#[derive(Debug)]
pub struct Settings {
    pub backup_path: PathBuf,
    pub sources: Vec<String>,
    pub series: TimeSeries,
    pub time_format: String,
    pub extension: String,
    pub dump: DumpCommand,
    pub timeout: Option<Duration>,
    pub compression_level: u32,
    pub mailgun: Option<MailgunConfig>,
}

impl Settings {
    /// Merge CLI overrides over the file config and validate the result
    pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self> {
        let rotation = file.rotation;

        let series = TimeSeries::new(
            rotation.quota,
            Duration::from_secs(rotation.hot_window_secs),
            Duration::from_secs(rotation.base_interval_secs),
        )
        .context("Invalid [rotation] settings")?;

        validate_time_format(&rotation.time_format)?;
        if rotation.extension.is_empty() {
            anyhow::bail!("Snapshot extension must not be empty");
        }

        let sources = if overrides.sources.is_empty() {
            file.databases
        } else {
            overrides.sources
        };

        let backup_path = overrides
            .backup_path
            .or(file.base_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_PATH));

        let dump = DumpCommand::new(overrides.dump_cmd.unwrap_or(file.dump.command))
            .with_args(file.dump.args);

        let timeout = overrides
            .timeout_secs
            .or(file.dump.timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Ok(Self {
            backup_path,
            sources,
            series,
            time_format: rotation.time_format,
            extension: rotation.extension,
            dump,
            timeout,
            compression_level: file.dump.compression_level,
            mailgun: file.mailgun,
        })
    }

    /// Snapshot producer for these settings
    pub fn producer(&self) -> Producer {
        Producer::new(self.dump.clone(), self.time_format.clone())
            .with_extension(self.extension.clone())
            .with_compression_level(self.compression_level)
            .with_timeout(self.timeout)
    }
}

/// 2001-02-03 04:05:06 UTC, every field distinct
const FORMAT_CHECK_INSTANT: i64 = 981_173_106;

/// The timestamp must render cleanly, never contain the `.` separator, and
/// parse back to the instant it was rendered from
fn validate_time_format(time_format: &str) -> Result<()> {
    if time_format.is_empty() {
        anyhow::bail!("Time format must not be empty");
    }
    if time_format.contains('.') {
        anyhow::bail!("Time format {:?} must not contain '.'", time_format);
    }
    if StrftimeItems::new(time_format).any(|item| matches!(item, Item::Error)) {
        anyhow::bail!("Invalid time format {:?}", time_format);
    }

    // Rendered names must parse back, or rotation would never see them
    let sample = Utc
        .timestamp_opt(FORMAT_CHECK_INSTANT, 0)
        .single()
        .context("Invalid format check instant")?;
    let name = format!("{}.{}", sample.format(time_format), DEFAULT_EXTENSION);
    match parse_created_at(&name, time_format) {
        Ok(parsed) if parsed == sample => Ok(()),
        Ok(parsed) => anyhow::bail!(
            "Time format {:?} does not round-trip: {:?} parsed as {}",
            time_format,
            name,
            parsed
        ),
        Err(e) => anyhow::bail!(
            "Time format {:?} produces names that cannot be parsed back ({:?}: {})",
            time_format,
            name,
            e
        ),
    }
}
