//! Progress reporting and run-scoped cancellation.
//!
//! The engine reports progress through the [`ProgressCallback`] trait. Each
//! detection run is driven through a [`RunContext`] which maps per-phase
//! counters onto a single overall fraction that never decreases, throttles
//! reports, and answers cancellation polls.
//!
//! [`Progress`] is the indicatif-backed terminal implementation used by the
//! binary.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::duplicates::DetectError;
use crate::signal::CancellationToken;

/// Stage of a detection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Content digests only
    Hashing,
    /// Similarity signatures only
    Signatures,
    /// Digests and signatures from a single read per file
    Artifacts,
    /// Bucketing by digest
    ExactGrouping,
    /// Pairwise filename comparison
    FilenameGrouping,
    /// Pairwise signature comparison and clustering
    SimilarityGrouping,
    /// Multi-criteria reconciliation
    Merging,
}

impl Phase {
    /// Short label used in logs and progress bars.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Hashing => "hashing",
            Self::Signatures => "signatures",
            Self::Artifacts => "artifacts",
            Self::ExactGrouping => "exact-grouping",
            Self::FilenameGrouping => "filename-grouping",
            Self::SimilarityGrouping => "similarity-grouping",
            Self::Merging => "merging",
        }
    }

    /// Relative share of a run spent in this phase.
    fn weight(self) -> f64 {
        match self {
            Self::Hashing | Self::Signatures | Self::Artifacts => 6.0,
            Self::SimilarityGrouping => 2.0,
            Self::FilenameGrouping => 1.0,
            Self::ExactGrouping | Self::Merging => 0.5,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One progress report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate<'a> {
    /// Current phase
    pub phase: Phase,
    /// Work units completed in this phase (files or comparisons)
    pub completed: usize,
    /// Total work units in this phase
    pub total: usize,
    /// Overall run progress in `[0, 1]`, monotonically non-decreasing
    pub fraction: f64,
    /// Name of the file most recently processed, when meaningful
    pub current_file: Option<&'a str>,
}

/// Progress callback for detection phases.
///
/// Implement this trait to receive progress updates during a run. Calls are
/// made from the thread driving the run, never from worker threads.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - The phase being entered
    /// * `total` - Total number of work units in the phase
    fn on_phase_start(&self, phase: Phase, total: usize);

    /// Called at bounded intervals while a phase runs.
    fn on_progress(&self, update: &ProgressUpdate<'_>);

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: Phase);
}

#[derive(Debug, Default)]
struct RunState {
    phase: Option<Phase>,
    phase_base: f64,
    phase_share: f64,
    last_reported: usize,
    fraction: f64,
}

/// Progress and cancellation context for one detection run.
pub struct RunContext {
    callback: Option<Arc<dyn ProgressCallback>>,
    cancellation: Option<CancellationToken>,
    interval: usize,
    plan: Vec<(Phase, f64)>,
    state: Mutex<RunState>,
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("callback", &self.callback.as_ref().map(|_| "<callback>"))
            .field("cancellation", &self.cancellation)
            .field("interval", &self.interval)
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}

impl RunContext {
    /// Create a context for a run that will pass through `phases` in order.
    ///
    /// `interval` is the minimum number of work units between two reports
    /// within a phase (clamped to at least 1).
    #[must_use]
    pub fn new(
        callback: Option<Arc<dyn ProgressCallback>>,
        cancellation: Option<CancellationToken>,
        interval: usize,
        phases: &[Phase],
    ) -> Self {
        let total_weight: f64 = phases.iter().map(|p| p.weight()).sum();
        let plan = phases
            .iter()
            .map(|&p| {
                let share = if total_weight > 0.0 {
                    p.weight() / total_weight
                } else {
                    0.0
                };
                (p, share)
            })
            .collect();

        Self {
            callback,
            cancellation,
            interval: interval.max(1),
            plan,
            state: Mutex::new(RunState::default()),
        }
    }

    /// Context with no callback and no cancellation, for standalone use of
    /// the groupers.
    #[must_use]
    pub fn detached() -> Self {
        Self::new(None, None, 1, &[])
    }

    /// Context that only observes `token`.
    #[must_use]
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self::new(None, Some(token), 1, &[])
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Return [`DetectError::Cancelled`] if cancellation has been requested.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::Cancelled`] once the token is set.
    pub fn check_cancelled(&self) -> Result<(), DetectError> {
        if self.is_cancelled() {
            Err(DetectError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Overall fraction reported so far.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        self.state.lock().map_or(0.0, |s| s.fraction)
    }

    /// Enter `phase` with `total` work units.
    pub fn phase_start(&self, phase: Phase, total: usize) {
        log::debug!("Phase {} started ({} units)", phase, total);

        if let Ok(mut state) = self.state.lock() {
            let mut base = 0.0;
            let mut share = 0.0;
            for &(p, s) in &self.plan {
                if p == phase {
                    share = s;
                    break;
                }
                base += s;
            }
            state.phase = Some(phase);
            state.phase_base = base.max(state.fraction);
            state.phase_share = share;
            state.last_reported = 0;
        }

        if let Some(cb) = &self.callback {
            cb.on_phase_start(phase, total);
        }
    }

    /// Report `completed` of `total` units in the current phase.
    ///
    /// Reports closer than the configured interval are dropped, except the
    /// final one (`completed == total`).
    pub fn report(&self, completed: usize, total: usize, current_file: Option<&str>) {
        let Some(cb) = &self.callback else {
            return;
        };

        let update = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            let Some(phase) = state.phase else {
                return;
            };
            let done = completed >= total;
            if !done && completed.saturating_sub(state.last_reported) < self.interval {
                return;
            }
            state.last_reported = completed;

            let within = if total == 0 {
                1.0
            } else {
                (completed as f64 / total as f64).min(1.0)
            };
            let fraction = (state.phase_base + state.phase_share * within).clamp(0.0, 1.0);
            state.fraction = state.fraction.max(fraction);

            (phase, state.fraction)
        };

        cb.on_progress(&ProgressUpdate {
            phase: update.0,
            completed,
            total,
            fraction: update.1,
            current_file,
        });
    }

    /// Leave `phase`.
    pub fn phase_end(&self, phase: Phase) {
        if let Ok(mut state) = self.state.lock() {
            let end = (state.phase_base + state.phase_share).clamp(0.0, 1.0);
            state.fraction = state.fraction.max(end);
            state.phase = None;
        }

        if let Some(cb) = &self.callback {
            cb.on_phase_end(phase);
        }
        log::debug!("Phase {} finished", phase);
    }
}

/// Terminal progress reporter using indicatif.
pub struct Progress {
    multi: MultiProgress,
    bar: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, no progress bars will be displayed.
    ///
    /// # Examples
    ///
    /// ```
    /// use dupesieve::progress::Progress;
    ///
    /// let progress = Progress::new(false);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            bar: Mutex::new(None),
            quiet,
        }
    }

    /// Spinner shown while the binary enumerates files.
    #[must_use]
    pub fn enumeration_spinner(&self) -> Option<ProgressBar> {
        if self.quiet {
            return None;
        }
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "),
        );
        pb.set_message("Enumerating files");
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    }

    fn bar_style(phase: Phase) -> ProgressStyle {
        let template = match phase {
            Phase::Hashing | Phase::Signatures | Phase::Artifacts => {
                "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg} (ETA: {eta})"
            }
            _ => "[{elapsed_precise}] [{bar:40.green/blue}] {percent}% {msg}",
        };
        ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█>-")
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("quiet", &self.quiet)
            .finish_non_exhaustive()
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: Phase, total: usize) {
        if self.quiet {
            return;
        }

        let pb = self.multi.add(ProgressBar::new(total as u64));
        pb.set_style(Self::bar_style(phase));
        pb.set_message(phase.label());
        if let Ok(mut bar) = self.bar.lock() {
            if let Some(old) = bar.replace(pb) {
                old.finish_and_clear();
            }
        }
    }

    fn on_progress(&self, update: &ProgressUpdate<'_>) {
        if self.quiet {
            return;
        }

        if let Ok(bar) = self.bar.lock() {
            if let Some(pb) = bar.as_ref() {
                pb.set_length(update.total as u64);
                pb.set_position(update.completed as u64);
                if let Some(name) = update.current_file {
                    pb.set_message(format!("{}: {}", update.phase, truncate_name(name, 30)));
                }
            }
        }
    }

    fn on_phase_end(&self, phase: Phase) {
        if self.quiet {
            return;
        }

        if let Ok(mut bar) = self.bar.lock() {
            if let Some(pb) = bar.take() {
                pb.finish_with_message(format!("{phase} complete"));
            }
        }
    }
}

/// Truncate a file name for display, keeping its tail.
fn truncate_name(name: &str, max_chars: usize) -> String {
    let count = name.chars().count();
    if count <= max_chars {
        return name.to_string();
    }
    let tail: String = name.chars().skip(count - max_chars + 3).collect();
    format!("...{tail}")
}
