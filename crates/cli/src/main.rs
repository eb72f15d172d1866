//! baktape CLI - periodic compressed snapshots with tiered retention

use anyhow::Result;
use archive::layout::{prepare_root, prepare_source_dir};
use archive::{Archiver, RunReport, SourceStatus};
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tracing::{error, info};

mod config;
mod logging;
mod notify;

use config::{FileConfig, Overrides, Settings};
use notify::{MailgunNotifier, Notifier};

/// Snapshot each source through a dump command and rotate old backups
#[derive(Parser, Debug)]
#[command(name = "baktape")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Sources (databases) to back up
    sources: Vec<String>,

    /// Backup root directory
    #[arg(short = 'b', long = "bak", value_name = "DIR")]
    bak: Option<PathBuf>,

    /// TOML config file
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Create the backup root and its parents if missing
    #[arg(short = 'p', long)]
    parents: bool,

    /// Dump program run once per source (default: mysqldump)
    #[arg(long, value_name = "PROGRAM")]
    dump_cmd: Option<String>,

    /// Seconds before a dump is killed (0 disables)
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Schedule removals without deleting anything
    #[arg(long)]
    dry_run: bool,

    /// Also append the log to this file
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

fn main() {
    // Exit only after the log guard has flushed
    std::process::exit(real_main());
}

fn real_main() -> i32 {
    let cli = Cli::parse();

    let (capture, _guard) = match logging::init(cli.log_file.as_deref()) {
        Ok(logging) => logging,
        Err(e) => {
            eprintln!("{:#}", e);
            return 1;
        }
    };

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            error!("{:#}", e);
            return 1;
        }
    };

    if settings.sources.is_empty() {
        eprintln!("{}", Cli::command().render_help());
        return 1;
    }

    let exit_code = match run(&cli, &settings) {
        Ok(report) => {
            print_summary(&report, cli.dry_run);
            report.exit_code()
        }
        Err(e) => {
            error!("{:#}", e);
            1
        }
    };
    info!("Exit code: {}", exit_code);

    if let Some(mailgun) = &settings.mailgun {
        let sent = MailgunNotifier::new(mailgun)
            .and_then(|notifier| notifier.notify(&mailgun.subject, &capture.contents()));
        if let Err(e) = sent {
            error!("Failed to send report: {:#}", e);
        }
    }

    exit_code
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let file = match &cli.config {
        Some(path) => config::load(path)?,
        None => FileConfig::default(),
    };

    let overrides = Overrides {
        sources: cli.sources.clone(),
        backup_path: cli.bak.clone(),
        dump_cmd: cli.dump_cmd.clone(),
        timeout_secs: cli.timeout,
    };

    Settings::resolve(file, overrides)
}

fn run(cli: &Cli, settings: &Settings) -> Result<RunReport> {
    prepare_root(&settings.backup_path, cli.parents)?;
    for source in &settings.sources {
        prepare_source_dir(&settings.backup_path, source)?;
    }

    let archiver = Archiver::new(
        &settings.backup_path,
        settings.producer(),
        settings.series.clone(),
    )
    .with_dry_run(cli.dry_run);

    Ok(archiver.run(&settings.sources))
}

fn print_summary(report: &RunReport, dry_run: bool) {
    println!();
    if report.is_success() {
        println!("{}", "Backup Complete".green().bold());
    } else {
        println!("{}", "Backup Finished With Errors".red().bold());
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    for outcome in &report.outcomes {
        match &outcome.status {
            SourceStatus::Completed { archive, rotation } => {
                let removed = if dry_run {
                    format!("{} staged", rotation.staged)
                } else {
                    format!("{} removed", rotation.removed)
                };
                println!(
                    "{} {}  kept {}, {}  {}",
                    "✓".green(),
                    outcome.source.bold(),
                    rotation.retained.to_string().yellow(),
                    removed,
                    archive.display().dimmed()
                );
            }
            SourceStatus::ProduceFailed(e) | SourceStatus::RotateFailed { error: e, .. } => {
                println!("{} {}  {:#}", "✗".red(), outcome.source.bold(), e);
            }
        }
    }
    println!();
}
