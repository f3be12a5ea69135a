//! Layered configuration.
//!
//! Values are resolved from, lowest to highest priority:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. A TOML file: `--config <path>`, or `config.toml` in the platform
//!    configuration directory
//! 3. Environment variables prefixed `DUPESIEVE_` (nested keys use `__`, e.g.
//!    `DUPESIEVE_WEIGHTS__FILENAME=0.5`)
//! 4. Command-line flags, merged by the caller through
//!    [`Config::load_with_overrides`]
//!
//! Unknown keys in the TOML file are rejected with a suggestion for the
//! closest known key.
//!
//! ```toml
//! similarity_threshold = 0.9
//! filename_mode = "fuzzy"
//! priority_order = ["exact", "filename", "similarity"]
//!
//! [weights]
//! filename = 0.7
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::duplicates::{
    Criterion, CriterionWeights, DetectionMode, DetectionParams, DetectorConfig, FilenameMode,
    DEFAULT_FILENAME_THRESHOLD, DEFAULT_PROGRESS_INTERVAL, DEFAULT_SIMILARITY_THRESHOLD,
};
use crate::scanner::shingle::{DEFAULT_SHINGLE_SIZE, DEFAULT_SIGNATURE_SIZE};
use crate::scanner::{ShingleConfig, WalkerConfig};

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "DUPESIEVE_";

/// Top-level keys accepted in the configuration file.
pub const KNOWN_KEYS: &[&str] = &[
    "hash_threads",
    "signature_threads",
    "shingle_size",
    "signature_size",
    "similarity_threshold",
    "filename_mode",
    "filename_threshold",
    "criteria",
    "priority_order",
    "weights",
    "progress_interval",
    "skip_hidden",
    "follow_symlinks",
    "min_size",
    "max_size",
    "ignore_patterns",
];

const WEIGHT_KEYS: &[&str] = &["exact", "similarity", "filename"];

/// Minimum Jaro-Winkler similarity for a "did you mean" suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.8;

/// Configuration errors.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    /// The file could not be read.
    #[error("Cannot read configuration file {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The file is not valid TOML.
    #[error("Malformed configuration file {path}: {source}")]
    Parse {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: toml::de::Error,
    },

    /// The file contains a key that is not recognized.
    #[error("Unknown configuration key '{key}'{}", suggestion_hint(.suggestion))]
    UnknownKey {
        /// Offending key, dotted for nested tables
        key: String,
        /// Closest known key
        suggestion: Option<String>,
    },

    /// A layer could not be deserialized into [`Config`].
    #[error("Invalid configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    /// A value is outside its domain.
    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue {
        /// Offending key
        key: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

fn suggestion_hint(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(" (did you mean '{s}'?)"))
        .unwrap_or_default()
}

/// Resolved configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hashing pool size; 0 derives it from the hardware.
    pub hash_threads: usize,
    /// Signature pool size; 0 derives it from the hardware.
    pub signature_threads: usize,
    /// Shingle width in bytes.
    pub shingle_size: usize,
    /// MinHash signature length.
    pub signature_size: usize,
    /// Similarity threshold in `(0, 1]`.
    pub similarity_threshold: f64,
    /// Filename comparison mode.
    pub filename_mode: FilenameMode,
    /// Filename threshold in `(0, 1]`.
    pub filename_threshold: f64,
    /// Criteria enabled in multi-criteria mode.
    pub criteria: Vec<Criterion>,
    /// Criteria ranked highest priority first.
    pub priority_order: Vec<Criterion>,
    /// Per-criterion weights.
    pub weights: CriterionWeights,
    /// Work units between progress reports.
    pub progress_interval: usize,
    /// Skip hidden files and directories while scanning.
    pub skip_hidden: bool,
    /// Follow symbolic links while scanning.
    pub follow_symlinks: bool,
    /// Smallest file size to scan, in bytes.
    pub min_size: Option<u64>,
    /// Largest file size to scan, in bytes.
    pub max_size: Option<u64>,
    /// Gitignore-style patterns to skip while scanning.
    pub ignore_patterns: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hash_threads: 0,
            signature_threads: 0,
            shingle_size: DEFAULT_SHINGLE_SIZE,
            signature_size: DEFAULT_SIGNATURE_SIZE,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            filename_mode: FilenameMode::default(),
            filename_threshold: DEFAULT_FILENAME_THRESHOLD,
            criteria: Criterion::ALL.to_vec(),
            priority_order: vec![Criterion::Exact, Criterion::Similarity, Criterion::Filename],
            weights: CriterionWeights::default(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            skip_hidden: false,
            follow_symlinks: false,
            min_size: None,
            max_size: None,
            ignore_patterns: Vec::new(),
        }
    }
}

impl Config {
    /// Default platform-specific configuration file path.
    ///
    /// Returns `None` if no home directory can be determined.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "dupesieve", "dupesieve")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Layered provider without command-line overrides.
    ///
    /// An explicit `path` must exist; the default path is optional.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing, or if the file is
    /// unreadable, malformed, or contains unknown keys.
    pub fn figment(path: Option<&Path>) -> Result<Figment, ConfigError> {
        let file = match path {
            Some(p) if !p.is_file() => return Err(ConfigError::NotFound(p.to_path_buf())),
            Some(p) => Some(p.to_path_buf()),
            None => Self::config_path().filter(|p| p.is_file()),
        };

        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            check_unknown_keys(&file)?;
            log::debug!("Loading configuration from {}", file.display());
            figment = figment.merge(Toml::file(&file));
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load and validate configuration.
    ///
    /// # Errors
    ///
    /// See [`Config::figment`] and [`Config::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment(path)?)
    }

    /// Load configuration with a final layer of overrides on top.
    ///
    /// `overrides` should skip unset fields when serialized so that lower
    /// layers show through.
    ///
    /// # Errors
    ///
    /// See [`Config::figment`] and [`Config::validate`].
    pub fn load_with_overrides<T: Serialize>(
        path: Option<&Path>,
        overrides: &T,
    ) -> Result<Self, ConfigError> {
        let figment = Self::figment(path)?.merge(Serialized::defaults(overrides));
        Self::from_figment(&figment)
    }

    /// Extract and validate a configuration from a provider.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Extract`] if a value has the wrong type, or
    /// the first [`Config::validate`] failure.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value against its domain.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shingle_size == 0 {
            return invalid("shingle_size", "must be at least 1");
        }
        if self.signature_size == 0 {
            return invalid("signature_size", "must be at least 1");
        }
        if self.progress_interval == 0 {
            return invalid("progress_interval", "must be at least 1");
        }
        check_threshold("similarity_threshold", self.similarity_threshold)?;
        check_threshold("filename_threshold", self.filename_threshold)?;

        if self.criteria.is_empty() {
            return invalid("criteria", "at least one criterion is required");
        }
        if self.priority_order.is_empty() {
            return invalid("priority_order", "must not be empty");
        }
        for (i, c) in self.priority_order.iter().enumerate() {
            if self.priority_order[..i].contains(c) {
                return invalid("priority_order", format!("'{c}' is listed twice"));
            }
        }
        for c in Criterion::ALL {
            let weight = self.weights.get(c);
            if !weight.is_finite() || weight <= 0.0 {
                return invalid("weights", format!("'{c}' must be positive, got {weight}"));
            }
        }

        if let (Some(min), Some(max)) = (self.min_size, self.max_size) {
            if min > max {
                return invalid("min_size", format!("{min} is larger than max_size {max}"));
            }
        }
        Ok(())
    }

    /// Engine configuration.
    #[must_use]
    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig::default()
            .with_hash_threads(self.hash_threads)
            .with_signature_threads(self.signature_threads)
            .with_shingle_config(ShingleConfig::new(self.shingle_size, self.signature_size))
            .with_progress_interval(self.progress_interval)
    }

    /// Detection parameters for `mode`.
    #[must_use]
    pub fn detection_params(&self, mode: DetectionMode) -> DetectionParams {
        DetectionParams {
            mode,
            similarity_threshold: self.similarity_threshold,
            filename_mode: self.filename_mode,
            filename_threshold: self.filename_threshold,
            criteria: self.criteria.iter().copied().collect(),
            weights: self.weights,
            priority_order: self.priority_order.clone(),
        }
    }

    /// Directory walker configuration.
    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig {
            follow_symlinks: self.follow_symlinks,
            skip_hidden: self.skip_hidden,
            min_size: self.min_size,
            max_size: self.max_size,
            ignore_patterns: self.ignore_patterns.clone(),
        }
    }
}

fn invalid(key: &'static str, reason: impl Into<String>) -> Result<(), ConfigError> {
    Err(ConfigError::InvalidValue {
        key,
        reason: reason.into(),
    })
}

fn check_threshold(key: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        invalid(key, format!("must be in (0, 1], got {value}"))
    }
}

/// Reject keys of `path` that [`Config`] does not know.
fn check_unknown_keys(path: &Path) -> Result<(), ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table: toml::Table = content.parse().map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    for (key, value) in &table {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            return Err(unknown_key(key.clone(), key, KNOWN_KEYS));
        }
        if key == "weights" {
            if let Some(weights) = value.as_table() {
                for sub in weights.keys() {
                    if !WEIGHT_KEYS.contains(&sub.as_str()) {
                        return Err(unknown_key(format!("weights.{sub}"), sub, WEIGHT_KEYS));
                    }
                }
            }
        }
    }
    Ok(())
}

fn unknown_key(key: String, name: &str, known: &[&str]) -> ConfigError {
    ConfigError::UnknownKey {
        key,
        suggestion: closest_key(name, known),
    }
}

/// Closest known key by Jaro-Winkler similarity, if close enough.
#[must_use]
pub fn closest_key(name: &str, known: &[&str]) -> Option<String> {
    known
        .iter()
        .map(|k| (strsim::jaro_winkler(name, k), *k))
        .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, k)| k.to_string())
}
