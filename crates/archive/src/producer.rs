//! Snapshot production
//!
//! Runs the dump command for one source and streams its standard output
//! through a gzip encoder into `<timestamp>.<extension>`. A run either
//! leaves a complete archive behind or no file at all.

use crate::size::format_size;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Default snapshot file extension
pub const DEFAULT_EXTENSION: &str = "sql.gz";

/// Default dump program
pub const DEFAULT_DUMP_PROGRAM: &str = "mysqldump";

/// How often a dump with a deadline is polled
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// External dump command; the source name is appended as the last argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpCommand {
    program: OsString,
    args: Vec<String>,
}

impl DumpCommand {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Arguments placed before the source name
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &OsString {
        &self.program
    }

    fn command(&self, source: &str) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).arg(source);

        // Own process group, so a timeout also reaches wrapper children
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        command
    }
}

impl Default for DumpCommand {
    fn default() -> Self {
        Self::new(DEFAULT_DUMP_PROGRAM)
    }
}

/// Writes one compressed snapshot per call
#[derive(Debug, Clone)]
pub struct Producer {
    dump: DumpCommand,
    time_format: String,
    extension: String,
    compression: Compression,
    timeout: Option<Duration>,
}

impl Producer {
    /// Create a producer naming files with `time_format`
    pub fn new(dump: DumpCommand, time_format: impl Into<String>) -> Self {
        Self {
            dump,
            time_format: time_format.into(),
            extension: DEFAULT_EXTENSION.to_string(),
            compression: Compression::default(),
            timeout: None,
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Gzip level, clamped to 0-9
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression = Compression::new(level.min(9));
        self
    }

    /// Kill the dump command once it runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn time_format(&self) -> &str {
        &self.time_format
    }

    /// File name for a snapshot taken at `now`
    pub fn file_name(&self, now: DateTime<Utc>) -> String {
        format!("{}.{}", now.format(&self.time_format), self.extension)
    }

    /// Dump `source` into a new archive inside `directory`
    ///
    /// On any failure the partially written archive is removed.
    pub fn produce(&self, source: &str, directory: &Path, now: DateTime<Utc>) -> Result<PathBuf> {
        let path = directory.join(self.file_name(now));

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .with_context(|| {
                format!("Failed to open archive {} for {:?}", path.display(), source)
            })?;

        let written = self
            .dump_into(source, GzEncoder::new(file, self.compression))
            .and_then(|encoder| finish(source, encoder));

        match written {
            Ok(size) => {
                info!("Wrote {} ({})", path.display(), format_size(size));
                Ok(path)
            }
            Err(e) => {
                // Never leave a broken archive behind
                if let Err(rm) = fs::remove_file(&path) {
                    warn!("Failed to remove partial archive {}: {}", path.display(), rm);
                } else {
                    debug!("Removed partial archive {}", path.display());
                }
                Err(e.context(format!("Dump failed on source {:?}", source)))
            }
        }
    }

    /// Run the dump command, pumping its stdout into `encoder`
    fn dump_into(&self, source: &str, encoder: GzEncoder<File>) -> Result<GzEncoder<File>> {
        let mut child = self
            .dump
            .command(source)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to spawn dump command {:?}", self.dump.program()))?;

        let mut stdout = child
            .stdout
            .take()
            .context("Dump command has no standard output")?;

        let pump = thread::spawn(move || -> io::Result<GzEncoder<File>> {
            let mut encoder = encoder;
            io::copy(&mut stdout, &mut encoder)?;
            Ok(encoder)
        });

        let status = wait_with_deadline(&mut child, self.timeout);

        if let Ok(None) = status {
            // A descendant that escaped the kill may still hold the pipe open,
            // so the pump is left to finish on its own
            drop(pump);
            anyhow::bail!(
                "Dump command timed out after {:?}",
                self.timeout.unwrap_or_default()
            );
        }

        let pumped = pump
            .join()
            .map_err(|_| anyhow!("Output pump thread panicked"))?;

        match status? {
            Some(status) if !status.success() => {
                anyhow::bail!("Dump command exited with {}", status)
            }
            _ => pumped.context("Failed to stream dump output"),
        }
    }
}

/// Close the encoder then the file, returning the archive size
fn finish(source: &str, encoder: GzEncoder<File>) -> Result<u64> {
    let file = encoder.finish().map_err(|e| {
        let err = anyhow::Error::new(e)
            .context(format!("Failed closing the gzip archiver for {:?}", source));
        error!("{:#}", err);
        err
    })?;

    let closed = file.sync_all().and_then(|_| file.metadata());
    closed.map(|metadata| metadata.len()).map_err(|e| {
        let err = anyhow::Error::new(e)
            .context(format!("Failed closing the file archive for {:?}", source));
        error!("{:#}", err);
        err
    })
}

/// Wait for the child, killing it once `timeout` elapses
///
/// Returns `None` when the deadline was hit.
fn wait_with_deadline(child: &mut Child, timeout: Option<Duration>) -> Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
        return Ok(Some(child.wait().context("Failed to wait for dump command")?));
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().context("Failed to poll dump command")? {
            return Ok(Some(status));
        }

        if Instant::now() >= deadline {
            warn!("Dump command exceeded {:?}, killing it", timeout);
            kill_dump(child);
            child.wait().context("Failed to reap dump command")?;
            return Ok(None);
        }

        thread::sleep(POLL_INTERVAL);
    }
}

/// Kill the dump command together with everything it spawned
#[cfg(unix)]
fn kill_dump(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    // The child leads its own process group, see `DumpCommand::command`
    match i32::try_from(child.id()) {
        Ok(pid) => {
            if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
                warn!("Failed to kill dump process group {}: {}", pid, e);
                kill_child(child);
            }
        }
        Err(_) => kill_child(child),
    }
}

#[cfg(not(unix))]
fn kill_dump(child: &mut Child) {
    kill_child(child);
}

fn kill_child(child: &mut Child) {
    if let Err(e) = child.kill() {
        warn!("Failed to kill dump command: {}", e);
    }
}
