//! dupesieve - duplicate and near-duplicate file detection
//!
//! The library is a detection engine over caller-supplied file batches:
//! exact content groups (BLAKE3), content-similarity clusters (MinHash over
//! byte shingles), filename groups, and a priority-weighted merge of the
//! three. The `dupesieve` binary wraps it with directory enumeration,
//! layered configuration and text or JSON reports.
//!
//! # Example
//!
//! ```
//! use dupesieve::duplicates::{DetectionParams, DuplicateDetector};
//! use dupesieve::scanner::{FileRecord, MemoryContentSource};
//! use std::time::SystemTime;
//!
//! let mut source = MemoryContentSource::new();
//! source.insert("/x/a.txt", "hello world");
//! source.insert("/y/a.txt", "hello world");
//! let files = vec![
//!     FileRecord::new("/x/a.txt", 11, SystemTime::UNIX_EPOCH),
//!     FileRecord::new("/y/a.txt", 11, SystemTime::UNIX_EPOCH),
//! ];
//!
//! let detector = DuplicateDetector::with_defaults().unwrap();
//! let report = detector.detect(&files, &source, &DetectionParams::exact()).unwrap();
//! assert_eq!(report.groups.len(), 1);
//! ```

pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Context;

use crate::cli::{Cli, Commands, OutputFormat, ScanArgs};
use crate::config::Config;
use crate::duplicates::{DetectError, DuplicateDetector};
use crate::error::ExitCode;
use crate::output::{JsonOutput, TextOutput};
use crate::progress::Progress;
use crate::scanner::{FsContentSource, Walker};

/// Run the command described by `cli`.
///
/// Installs the logger and the Ctrl+C handler, then dispatches.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the scan root is unusable,
/// detection fails or is cancelled, or the report cannot be written.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet, cli.no_color);

    match &cli.command {
        Commands::Scan(args) => handle_scan(&cli, args),
    }
}

fn handle_scan(cli: &Cli, args: &ScanArgs) -> anyhow::Result<ExitCode> {
    let mut config = Config::load_with_overrides(cli.config.as_deref(), &args.overrides())
        .context("Failed to load configuration")?;
    config
        .ignore_patterns
        .extend(args.ignore_patterns.iter().cloned());

    let params = config.detection_params(args.mode);
    params.validate()?;

    let token = signal::install_handler().context("Failed to install Ctrl+C handler")?;

    let show_progress = !cli.quiet && !args.no_progress;
    let progress = Arc::new(Progress::new(!show_progress));

    let spinner = progress.enumeration_spinner();
    let walker = Walker::new(&args.path, config.walker_config()).with_cancellation(token.clone());
    let (files, scan_errors) = walker
        .collect()
        .with_context(|| format!("Failed to scan {}", args.path.display()))?;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    if token.is_cancelled() {
        return Err(DetectError::Cancelled.into());
    }
    for err in &scan_errors {
        log::warn!("Skipped: {err}");
    }

    let mut detector_config = config.detector_config().with_cancellation(token);
    if show_progress {
        detector_config = detector_config.with_progress_callback(progress);
    }
    let detector = DuplicateDetector::new(detector_config)?;
    let report = detector.detect(&files, &FsContentSource, &params)?;

    let exit_code = if report.groups.is_empty() {
        ExitCode::NoDuplicates
    } else if report.is_partial() || !scan_errors.is_empty() {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.output {
        OutputFormat::Json => JsonOutput::new(&report, scan_errors.len(), exit_code)
            .write_to(&mut out, true)
            .context("Failed to write JSON report")?,
        OutputFormat::Text => TextOutput::new(&report, scan_errors.len())
            .write_to(&mut out)
            .context("Failed to write report")?,
    }
    out.flush()?;

    Ok(exit_code)
}
