//! Per-source backup orchestration
//!
//! Each source is processed on its own: produce a fresh snapshot, then scan,
//! schedule and purge that source's directory. A failure is recorded against
//! the source and the run moves on to the next one.

use crate::producer::Producer;
use crate::size::format_size;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rotation::{list_dir, purge, scan, schedule, TimeSeries};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Produces and rotates snapshots below a backup root
#[derive(Debug, Clone)]
pub struct Archiver {
    root: PathBuf,
    producer: Producer,
    series: TimeSeries,
    dry_run: bool,
}

/// What a rotation pass did to one directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationSummary {
    /// Snapshots left in place
    pub retained: usize,
    /// Snapshots scheduled for deletion
    pub staged: usize,
    /// Snapshots actually deleted
    pub removed: usize,
}

/// Result of processing one source
#[derive(Debug)]
pub enum SourceStatus {
    /// Snapshot written and directory rotated
    Completed {
        archive: PathBuf,
        rotation: RotationSummary,
    },
    /// No snapshot was written; rotation was skipped
    ProduceFailed(anyhow::Error),
    /// Snapshot written but rotation failed
    RotateFailed {
        archive: PathBuf,
        error: anyhow::Error,
    },
}

/// Outcome of one source within a run
#[derive(Debug)]
pub struct SourceOutcome {
    pub source: String,
    pub status: SourceStatus,
    pub elapsed: Duration,
}

impl SourceOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, SourceStatus::Completed { .. })
    }

    /// Error that made this source fail, if any
    pub fn error(&self) -> Option<&anyhow::Error> {
        match &self.status {
            SourceStatus::Completed { .. } => None,
            SourceStatus::ProduceFailed(error) | SourceStatus::RotateFailed { error, .. } => {
                Some(error)
            }
        }
    }
}

/// Outcomes of a whole run, in source order
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<SourceOutcome>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(SourceOutcome::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &SourceOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Process exit code: 0 when every source succeeded, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

impl Archiver {
    pub fn new(root: impl Into<PathBuf>, producer: Producer, series: TimeSeries) -> Self {
        Self {
            root: root.into(),
            producer,
            series,
            dry_run: false,
        }
    }

    /// Schedule purges without deleting anything
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Process every source in order, never stopping early
    pub fn run<S: AsRef<str>>(&self, sources: &[S]) -> RunReport {
        let mut report = RunReport::default();

        for source in sources {
            let outcome = self.process(source.as_ref(), Utc::now());
            if let Some(e) = outcome.error() {
                error!("{:?}: {:#}", outcome.source, e);
            }
            report.outcomes.push(outcome);
        }

        report
    }

    /// Produce then rotate a single source
    pub fn process(&self, source: &str, now: DateTime<Utc>) -> SourceOutcome {
        let start = Instant::now();
        let dir = self.root.join(source);

        info!("Source: {:?}", source);
        info!("{}", "#".repeat(32));
        info!("Archiving...");

        let status = match self.producer.produce(source, &dir, now) {
            Err(e) => SourceStatus::ProduceFailed(e),
            Ok(archive) => {
                info!("Done in {:?}", start.elapsed());
                info!("Preparing to rotate backups for {:?}", source);

                match self.rotate(&dir, now) {
                    Ok(rotation) => SourceStatus::Completed { archive, rotation },
                    Err(e) => SourceStatus::RotateFailed {
                        archive,
                        error: e.context(format!("Rotation for {:?} encountered errors", source)),
                    },
                }
            }
        };

        SourceOutcome {
            source: source.to_string(),
            status,
            elapsed: start.elapsed(),
        }
    }

    /// Scan, schedule and purge one snapshot directory
    pub fn rotate(&self, dir: &Path, now: DateTime<Utc>) -> Result<RotationSummary> {
        // 1. List and parse
        let listing = list_dir(dir)?;
        info!("Directory listing:");
        for file in &listing {
            info!("- [{}] {}", format_size(file.size), file.name);
        }
        let entries = scan(listing, self.producer.time_format(), now);

        // 2. Schedule
        let result = schedule(&self.series, &entries, now);
        for (index, tape) in result.tapes.iter().enumerate() {
            for entry in tape {
                debug!(
                    "Tape {} (< {}s): {}",
                    index,
                    threshold_secs(&self.series, index),
                    entry.name()
                );
            }
        }
        info!(
            "Retaining {} of {} backups",
            result.retained_count(),
            entries.len()
        );

        let mut summary = RotationSummary {
            retained: result.retained_count(),
            staged: result.purge.len(),
            removed: 0,
        };

        // 3. Purge
        if self.dry_run {
            for entry in &result.purge {
                info!("- {} (dry run, not removed)", entry.name());
            }
            return Ok(summary);
        }

        summary.removed = purge(dir, &result.purge)?;
        Ok(summary)
    }
}

fn threshold_secs(series: &TimeSeries, index: usize) -> i64 {
    series.threshold(index).map_or(0, |t| t.num_seconds())
}
