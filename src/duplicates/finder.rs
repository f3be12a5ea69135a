//! Detection engine.
//!
//! # Overview
//!
//! [`DuplicateDetector`] is a caller-constructed engine instance. It owns its
//! configuration and its worker pools; there is no process-wide state. One
//! call to [`DuplicateDetector::detect`] processes one file batch:
//!
//! 1. Validate parameters (fail fast, before any file is read)
//! 2. Compute the per-file artifacts the mode needs (digests, signatures)
//! 3. Run the relevant grouper(s)
//! 4. In multi-criteria mode, merge the groupers' results
//! 5. Return groups with summary statistics
//!
//! # Example
//!
//! ```
//! use dupesieve::duplicates::{DetectionParams, DetectorConfig, DuplicateDetector};
//! use dupesieve::scanner::{FileRecord, MemoryContentSource};
//! use std::time::SystemTime;
//!
//! let mut source = MemoryContentSource::new();
//! let mut files = Vec::new();
//! for (path, content) in [("/a.txt", "same"), ("/b.txt", "same"), ("/c.txt", "different")] {
//!     source.insert(path, content);
//!     files.push(FileRecord::new(path, content.len() as u64, SystemTime::UNIX_EPOCH));
//! }
//!
//! let detector = DuplicateDetector::new(DetectorConfig::default()).unwrap();
//! let report = detector.detect(&files, &source, &DetectionParams::exact()).unwrap();
//!
//! assert_eq!(report.groups.len(), 1);
//! assert_eq!(report.summary.duplicate_files, 1);
//! ```

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use super::exact::group_exact;
use super::filename::{group_by_filename, FilenameMode};
use super::groups::{Criterion, Group};
use super::merge::{merge_groups, CriterionGroups, CriterionWeights, MergeConfig};
use super::scheduler::{ArtifactNeeds, ArtifactScheduler};
use super::similarity::cluster_by_similarity;
use crate::progress::{Phase, ProgressCallback, RunContext};
use crate::scanner::{ContentSource, FileRecord, ReadError, ShingleConfig};
use crate::signal::CancellationToken;

/// Default similarity threshold.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;
/// Default filename threshold.
pub const DEFAULT_FILENAME_THRESHOLD: f64 = 0.85;
/// Default number of files between progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 16;

/// Errors that end a detection run.
///
/// Per-file read failures are not errors; they are listed in
/// [`DetectionReport::unreadable`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectError {
    /// Parameters rejected before any work began.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Cooperative cancellation was observed.
    #[error("Detection cancelled")]
    Cancelled,

    /// The engine failed for a reason unrelated to the input.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DetectError {
    /// Whether this outcome is a caller-requested cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Detection strategy for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionMode {
    /// Identical content
    #[default]
    Exact,
    /// Similar file names
    Filename,
    /// Similar content
    Similarity,
    /// Priority-weighted combination
    MultiCriteria,
}

impl DetectionMode {
    /// Kebab-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Filename => "filename",
            Self::Similarity => "similarity",
            Self::MultiCriteria => "multi-criteria",
        }
    }
}

impl fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectionMode {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "exact" => Ok(Self::Exact),
            "filename" | "name" => Ok(Self::Filename),
            "similarity" | "similar" => Ok(Self::Similarity),
            "multi-criteria" | "multi" | "combined" => Ok(Self::MultiCriteria),
            other => Err(DetectError::InvalidParameters(format!(
                "unknown detection mode '{other}' (expected exact, filename, similarity or multi-criteria)"
            ))),
        }
    }
}

/// Mode and mode parameters of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionParams {
    /// Detection strategy
    pub mode: DetectionMode,
    /// Similarity threshold in `(0, 1]`
    pub similarity_threshold: f64,
    /// Filename comparison mode
    pub filename_mode: FilenameMode,
    /// Filename threshold in `(0, 1]`
    pub filename_threshold: f64,
    /// Enabled strategies (multi-criteria only)
    pub criteria: BTreeSet<Criterion>,
    /// Per-criterion weights (multi-criteria only)
    pub weights: CriterionWeights,
    /// Strategies ranked highest priority first (multi-criteria only)
    pub priority_order: Vec<Criterion>,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            mode: DetectionMode::Exact,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            filename_mode: FilenameMode::default(),
            filename_threshold: DEFAULT_FILENAME_THRESHOLD,
            criteria: Criterion::ALL.into_iter().collect(),
            weights: CriterionWeights::default(),
            priority_order: vec![Criterion::Exact, Criterion::Similarity, Criterion::Filename],
        }
    }
}

impl DetectionParams {
    /// Exact-content mode.
    #[must_use]
    pub fn exact() -> Self {
        Self::default()
    }

    /// Filename mode.
    #[must_use]
    pub fn filename(mode: FilenameMode, threshold: f64) -> Self {
        Self {
            mode: DetectionMode::Filename,
            filename_mode: mode,
            filename_threshold: threshold,
            ..Self::default()
        }
    }

    /// Content-similarity mode.
    #[must_use]
    pub fn similarity(threshold: f64) -> Self {
        Self {
            mode: DetectionMode::Similarity,
            similarity_threshold: threshold,
            ..Self::default()
        }
    }

    /// Multi-criteria mode with default thresholds.
    #[must_use]
    pub fn multi_criteria(
        criteria: impl IntoIterator<Item = Criterion>,
        weights: CriterionWeights,
        priority_order: Vec<Criterion>,
    ) -> Self {
        Self {
            mode: DetectionMode::MultiCriteria,
            criteria: criteria.into_iter().collect(),
            weights,
            priority_order,
            ..Self::default()
        }
    }

    /// Set the similarity threshold.
    #[must_use]
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Set the filename mode and threshold.
    #[must_use]
    pub fn with_filename(mut self, mode: FilenameMode, threshold: f64) -> Self {
        self.filename_mode = mode;
        self.filename_threshold = threshold;
        self
    }

    /// Strategies that run for this mode.
    #[must_use]
    pub fn enabled_criteria(&self) -> BTreeSet<Criterion> {
        match self.mode {
            DetectionMode::Exact => BTreeSet::from([Criterion::Exact]),
            DetectionMode::Filename => BTreeSet::from([Criterion::Filename]),
            DetectionMode::Similarity => BTreeSet::from([Criterion::Similarity]),
            DetectionMode::MultiCriteria => self.criteria.clone(),
        }
    }

    /// Artifacts the enabled strategies need.
    #[must_use]
    pub fn needs(&self) -> ArtifactNeeds {
        let enabled = self.enabled_criteria();
        ArtifactNeeds {
            digest: enabled.contains(&Criterion::Exact),
            signature: enabled.contains(&Criterion::Similarity),
        }
    }

    /// Check thresholds, criteria, weights and priority order.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::InvalidParameters`] describing the first problem.
    pub fn validate(&self) -> Result<(), DetectError> {
        let enabled = self.enabled_criteria();

        if enabled.contains(&Criterion::Similarity) {
            check_threshold("similarity threshold", self.similarity_threshold)?;
        }
        if enabled.contains(&Criterion::Filename) {
            check_threshold("filename threshold", self.filename_threshold)?;
        }

        if self.mode != DetectionMode::MultiCriteria {
            return Ok(());
        }

        if self.criteria.is_empty() {
            return invalid("multi-criteria mode needs at least one criterion");
        }
        if self.priority_order.is_empty() {
            return invalid("multi-criteria mode needs a non-empty priority order");
        }
        let mut seen = BTreeSet::new();
        for c in &self.priority_order {
            if !seen.insert(*c) {
                return invalid(format!("criterion '{c}' appears twice in the priority order"));
            }
        }
        for c in &self.criteria {
            if !seen.contains(c) {
                return invalid(format!("criterion '{c}' is missing from the priority order"));
            }
            let weight = self.weights.get(*c);
            if !weight.is_finite() || weight <= 0.0 {
                return invalid(format!("weight of '{c}' must be a positive number, got {weight}"));
            }
        }
        Ok(())
    }

    fn thresholds_used(&self) -> ThresholdsUsed {
        let enabled = self.enabled_criteria();
        let filename = enabled.contains(&Criterion::Filename);
        ThresholdsUsed {
            similarity: enabled
                .contains(&Criterion::Similarity)
                .then_some(self.similarity_threshold),
            filename: filename.then_some(self.filename_threshold),
            filename_mode: filename.then_some(self.filename_mode),
        }
    }

    fn phases(&self) -> Vec<Phase> {
        let enabled = self.enabled_criteria();
        let mut phases: Vec<Phase> = self.needs().phase().into_iter().collect();
        if enabled.contains(&Criterion::Exact) {
            phases.push(Phase::ExactGrouping);
        }
        if enabled.contains(&Criterion::Filename) {
            phases.push(Phase::FilenameGrouping);
        }
        if enabled.contains(&Criterion::Similarity) {
            phases.push(Phase::SimilarityGrouping);
        }
        if self.mode == DetectionMode::MultiCriteria {
            phases.push(Phase::Merging);
        }
        phases
    }
}

fn invalid(message: impl Into<String>) -> Result<(), DetectError> {
    Err(DetectError::InvalidParameters(message.into()))
}

fn check_threshold(name: &str, value: f64) -> Result<(), DetectError> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        invalid(format!("{name} must be in (0, 1], got {value}"))
    }
}

/// Thresholds that applied to a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct ThresholdsUsed {
    /// Similarity threshold, when similarity grouping ran
    pub similarity: Option<f64>,
    /// Filename threshold, when filename grouping ran
    pub filename: Option<f64>,
    /// Filename mode, when filename grouping ran
    pub filename_mode: Option<FilenameMode>,
}

/// Summary statistics of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct DetectionSummary {
    /// Number of groups
    pub group_count: usize,
    /// Files that belong to some group
    pub grouped_files: usize,
    /// Grouped files beyond one keeper per group
    pub duplicate_files: usize,
    /// Bytes freed by keeping only the suggested keeper of each group
    pub wasted_space: u64,
    /// Files whose content was read, or not needed
    pub readable_files: usize,
    /// Files whose content could not be read
    pub unreadable_files: usize,
}

impl DetectionSummary {
    fn from_groups(groups: &[Group], total_files: usize, unreadable: usize) -> Self {
        Self {
            group_count: groups.len(),
            grouped_files: groups.iter().map(Group::len).sum(),
            duplicate_files: groups.iter().map(Group::duplicate_count).sum(),
            wasted_space: groups.iter().map(Group::wasted_space).sum(),
            readable_files: total_files - unreadable,
            unreadable_files: unreadable,
        }
    }
}

/// Result of one detection run.
#[derive(Debug, Clone)]
pub struct DetectionReport {
    /// Groups in deterministic order
    pub groups: Vec<Group>,
    /// Number of files in the batch
    pub total_files: usize,
    /// Mode of the run
    pub scan_mode: DetectionMode,
    /// Thresholds that applied
    pub thresholds_used: ThresholdsUsed,
    /// Files whose content could not be read
    pub unreadable: Vec<ReadError>,
    /// Summary statistics
    pub summary: DetectionSummary,
    /// Wall-clock time of the run
    pub duration: Duration,
}

impl DetectionReport {
    /// Whether any file could not be read.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.unreadable.is_empty()
    }
}

/// Engine configuration.
#[derive(Clone)]
pub struct DetectorConfig {
    /// Hashing pool size; 0 derives it from the hardware.
    pub hash_threads: usize,
    /// Signature pool size; 0 derives it from the hardware.
    pub signature_threads: usize,
    /// Shingle width and signature length.
    pub shingle: ShingleConfig,
    /// Minimum work units between progress reports.
    pub progress_interval: usize,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
    /// Optional cooperative cancellation token.
    pub cancellation: Option<CancellationToken>,
}

impl fmt::Debug for DetectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectorConfig")
            .field("hash_threads", &self.hash_threads)
            .field("signature_threads", &self.signature_threads)
            .field("shingle", &self.shingle)
            .field("progress_interval", &self.progress_interval)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .field("cancellation", &self.cancellation)
            .finish()
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            hash_threads: 0,
            signature_threads: 0,
            shingle: ShingleConfig::default(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            progress_callback: None,
            cancellation: None,
        }
    }
}

impl DetectorConfig {
    /// Set the hashing pool size (0 = derive).
    #[must_use]
    pub fn with_hash_threads(mut self, threads: usize) -> Self {
        self.hash_threads = threads;
        self
    }

    /// Set the signature pool size (0 = derive).
    #[must_use]
    pub fn with_signature_threads(mut self, threads: usize) -> Self {
        self.signature_threads = threads;
        self
    }

    /// Set shingle width and signature length.
    #[must_use]
    pub fn with_shingle_config(mut self, shingle: ShingleConfig) -> Self {
        self.shingle = ShingleConfig::new(shingle.shingle_size, shingle.signature_size);
        self
    }

    /// Set the progress interval (minimum 1).
    #[must_use]
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Set the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// Duplicate and near-duplicate detection engine.
#[derive(Debug)]
pub struct DuplicateDetector {
    config: DetectorConfig,
    scheduler: ArtifactScheduler,
}

impl DuplicateDetector {
    /// Build an engine and its worker pools.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::Internal`] if a worker pool cannot be created.
    pub fn new(config: DetectorConfig) -> Result<Self, DetectError> {
        let scheduler =
            ArtifactScheduler::new(config.hash_threads, config.signature_threads, config.shingle)?;
        Ok(Self { config, scheduler })
    }

    /// Build an engine with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::Internal`] if a worker pool cannot be created.
    pub fn with_defaults() -> Result<Self, DetectError> {
        Self::new(DetectorConfig::default())
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Worker pool sizes as `(hashing, signature)`.
    #[must_use]
    pub fn pool_sizes(&self) -> (usize, usize) {
        (
            self.scheduler.hash_threads(),
            self.scheduler.signature_threads(),
        )
    }

    /// Run detection over one file batch.
    ///
    /// # Errors
    ///
    /// - [`DetectError::InvalidParameters`] if `params` is invalid or the batch
    ///   contains a path twice; nothing is read in that case
    /// - [`DetectError::Cancelled`] if the cancellation token is set during the
    ///   run; no partial groups are returned
    pub fn detect(
        &self,
        files: &[FileRecord],
        source: &dyn ContentSource,
        params: &DetectionParams,
    ) -> Result<DetectionReport, DetectError> {
        let start = Instant::now();
        params.validate()?;
        check_unique_paths(files)?;

        let ctx = RunContext::new(
            self.config.progress_callback.clone(),
            self.config.cancellation.clone(),
            self.config.progress_interval,
            &params.phases(),
        );
        ctx.check_cancelled()?;

        log::info!(
            "Starting {} detection over {} files",
            params.mode,
            files.len()
        );

        let artifacts = self
            .scheduler
            .compute(files, source, params.needs(), &ctx)?;
        let enabled = params.enabled_criteria();
        let mut found = CriterionGroups::default();

        if enabled.contains(&Criterion::Exact) {
            ctx.check_cancelled()?;
            ctx.phase_start(Phase::ExactGrouping, files.len());
            found.exact = group_exact(artifacts.digest_pairs(files));
            ctx.report(files.len(), files.len(), None);
            ctx.phase_end(Phase::ExactGrouping);
            log::info!("Exact grouping: {} groups", found.exact.len());
        }

        if enabled.contains(&Criterion::Filename) {
            let refs: Vec<&FileRecord> = files.iter().collect();
            found.filename = group_by_filename(
                &refs,
                params.filename_mode,
                params.filename_threshold,
                &ctx,
            )?;
        }

        if enabled.contains(&Criterion::Similarity) {
            let entries = artifacts.signature_pairs(files);
            found.similarity =
                cluster_by_similarity(&entries, params.similarity_threshold, &ctx)?;
        }

        let groups = match params.mode {
            DetectionMode::Exact => found.exact,
            DetectionMode::Filename => found.filename,
            DetectionMode::Similarity => found.similarity,
            DetectionMode::MultiCriteria => {
                let order: Vec<Criterion> = params
                    .priority_order
                    .iter()
                    .copied()
                    .filter(|c| enabled.contains(c))
                    .collect();
                let config = MergeConfig::new(order, params.weights);
                merge_groups(&found, &config, &ctx)?
            }
        };

        let unreadable = artifacts.failures;
        let summary = DetectionSummary::from_groups(&groups, files.len(), unreadable.len());
        let duration = start.elapsed();

        log::info!(
            "Detection complete: {} groups, {} duplicate files, {} reclaimable, {} unreadable in {:.2?}",
            summary.group_count,
            summary.duplicate_files,
            bytesize::ByteSize::b(summary.wasted_space),
            summary.unreadable_files,
            duration
        );

        Ok(DetectionReport {
            groups,
            total_files: files.len(),
            scan_mode: params.mode,
            thresholds_used: params.thresholds_used(),
            unreadable,
            summary,
            duration,
        })
    }
}

fn check_unique_paths(files: &[FileRecord]) -> Result<(), DetectError> {
    let mut seen = HashSet::with_capacity(files.len());
    for file in files {
        if !seen.insert(file.path.as_path()) {
            return Err(DetectError::InvalidParameters(format!(
                "path appears twice in the batch: {}",
                file.path.display()
            )));
        }
    }
    Ok(())
}
