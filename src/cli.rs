//! Command-line interface definitions for dupesieve.
//!
//! Global options control verbosity, color and error formatting; the `scan`
//! subcommand enumerates a directory and runs one detection mode over it.
//!
//! # Example
//!
//! ```bash
//! # Exact duplicates, text summary
//! dupesieve scan ~/Downloads
//!
//! # Near-duplicate content as JSON
//! dupesieve scan ~/Documents --mode similarity --similarity-threshold 0.9 --output json
//!
//! # All strategies merged, filename first
//! dupesieve scan ~/Photos --mode multi-criteria --priority filename,exact,similarity
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use crate::duplicates::{Criterion, DetectionMode, FilenameMode};

/// Duplicate and near-duplicate file detection.
///
/// dupesieve groups files by identical content (BLAKE3), by similar content
/// (MinHash over byte shingles), by similar names, or by a priority-weighted
/// combination of the three.
#[derive(Debug, Parser)]
#[command(name = "dupesieve")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (default: platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a directory for duplicate and near-duplicate files
    Scan(ScanArgs),
}

/// Arguments for the scan subcommand.
///
/// Options left unset fall back to the configuration file, then to the
/// environment, then to built-in defaults.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory to scan
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Detection mode: exact, filename, similarity or multi-criteria
    #[arg(short, long, value_name = "MODE", default_value = "exact")]
    pub mode: DetectionMode,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Similarity threshold in (0, 1]
    #[arg(long, value_name = "T")]
    pub similarity_threshold: Option<f64>,

    /// Filename mode: exact, exact-base, smart or fuzzy
    #[arg(long, value_name = "MODE")]
    pub filename_mode: Option<FilenameMode>,

    /// Filename threshold in (0, 1]
    #[arg(long, value_name = "T")]
    pub filename_threshold: Option<f64>,

    /// Criteria enabled in multi-criteria mode (comma-separated)
    #[arg(long, value_name = "LIST", value_delimiter = ',')]
    pub criteria: Option<Vec<Criterion>>,

    /// Criteria ranked highest priority first (comma-separated)
    #[arg(long, value_name = "LIST", value_delimiter = ',')]
    pub priority: Option<Vec<Criterion>>,

    /// Criterion weight, e.g. `filename=0.5` (can be specified multiple times)
    #[arg(long = "weight", value_name = "CRITERION=W", value_parser = parse_weight)]
    pub weights: Vec<(Criterion, f64)>,

    /// Hashing threads (0 = derive from hardware)
    #[arg(long, value_name = "N")]
    pub hash_threads: Option<usize>,

    /// Signature threads (0 = derive from hardware)
    #[arg(long, value_name = "N")]
    pub signature_threads: Option<usize>,

    /// Shingle width in bytes
    #[arg(long, value_name = "K")]
    pub shingle_size: Option<usize>,

    /// MinHash signature length
    #[arg(long, value_name = "N")]
    pub signature_size: Option<usize>,

    /// Minimum file size to consider (e.g., 1KB, 1MB, 1GB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Maximum file size to consider (e.g., 1KB, 1MB, 1GB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub max_size: Option<u64>,

    /// Glob patterns to ignore (can be specified multiple times)
    ///
    /// Added to the configured patterns and the root .gitignore.
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Follow symbolic links during scan
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (starting with .)
    #[arg(long)]
    pub skip_hidden: bool,

    /// Do not draw progress bars
    #[arg(long)]
    pub no_progress: bool,
}

impl ScanArgs {
    /// Flags that were given, as a configuration layer.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            hash_threads: self.hash_threads,
            signature_threads: self.signature_threads,
            shingle_size: self.shingle_size,
            signature_size: self.signature_size,
            similarity_threshold: self.similarity_threshold,
            filename_mode: self.filename_mode,
            filename_threshold: self.filename_threshold,
            criteria: self.criteria.clone(),
            priority_order: self.priority.clone(),
            weights: self
                .weights
                .iter()
                .map(|(c, w)| (c.as_str().to_string(), *w))
                .collect(),
            skip_hidden: self.skip_hidden.then_some(true),
            follow_symlinks: self.follow_symlinks.then_some(true),
            min_size: self.min_size,
            max_size: self.max_size,
        }
    }
}

/// Command-line layer of the configuration.
///
/// Unset fields are omitted so that lower layers show through.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    hash_threads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature_threads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shingle_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    similarity_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename_mode: Option<FilenameMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    criteria: Option<Vec<Criterion>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority_order: Option<Vec<Criterion>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    weights: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skip_hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    follow_symlinks: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_size: Option<u64>,
}

/// Output format for scan results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    Text,
    /// JSON report for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Parse a `criterion=weight` pair.
///
/// # Errors
///
/// Returns an error if the `=` is missing, the criterion is unknown, or the
/// weight is not a number.
pub fn parse_weight(s: &str) -> Result<(Criterion, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Expected CRITERION=WEIGHT, got '{s}'"))?;
    let criterion = name.parse::<Criterion>().map_err(|e| e.to_string())?;
    let weight = value
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("Invalid weight: '{}'", value.trim()))?;
    Ok((criterion, weight))
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use dupesieve::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
/// assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
/// ```
///
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }
    if s.starts_with('-') {
        return Err("Size cannot be negative".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
