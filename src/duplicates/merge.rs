//! Multi-criteria merging.
//!
//! # Overview
//!
//! The merger reconciles the groups of the exact, filename and similarity
//! groupers into one set of groups in which every file belongs to at most one
//! group.
//!
//! Source groups are visited criterion by criterion in priority order. The
//! reduction state is an ownership map (file path to merged group) plus the
//! list of merged groups:
//!
//! - unowned files of a source group seed a new merged group;
//! - for each distinct owner of the remaining files, [`fold_decision`] decides
//!   whether the source's criterion is folded into that owner;
//! - after each criterion pass, merged groups created in that pass with fewer
//!   than two files are dropped and their files released.
//!
//! Final groups are sorted by confidence, highest first.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::finder::DetectError;
use super::groups::{Criterion, CriterionDetail, Group, MergeDetail};
use crate::progress::{Phase, RunContext};
use crate::scanner::FileRecord;

/// Confidence gained per file beyond the second.
const SIZE_STEP: f64 = 0.05;
/// Upper bound of the group size factor.
const SIZE_CAP: f64 = 1.2;
/// Fixed factor for exact-content groups.
const EXACT_BOOST: f64 = 1.1;

/// Relative weight of each criterion.
///
/// Weights need not sum to 1; only their ratios matter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriterionWeights {
    /// Weight of exact-content groups
    pub exact: f64,
    /// Weight of content-similarity groups
    pub similarity: f64,
    /// Weight of filename groups
    pub filename: f64,
}

impl Default for CriterionWeights {
    fn default() -> Self {
        Self {
            exact: 1.0,
            similarity: 0.8,
            filename: 0.6,
        }
    }
}

impl CriterionWeights {
    /// Weight of `criterion`.
    #[must_use]
    pub fn get(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::Exact => self.exact,
            Criterion::Filename => self.filename,
            Criterion::Similarity => self.similarity,
        }
    }

    /// Set the weight of `criterion`.
    #[must_use]
    pub fn with(mut self, criterion: Criterion, weight: f64) -> Self {
        match criterion {
            Criterion::Exact => self.exact = weight,
            Criterion::Filename => self.filename = weight,
            Criterion::Similarity => self.similarity = weight,
        }
        self
    }
}

/// Merger settings.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeConfig {
    /// Criteria to merge, highest priority first
    pub priority_order: Vec<Criterion>,
    /// Per-criterion weights
    pub weights: CriterionWeights,
}

impl MergeConfig {
    /// Create a merger configuration.
    #[must_use]
    pub fn new(priority_order: Vec<Criterion>, weights: CriterionWeights) -> Self {
        Self {
            priority_order,
            weights,
        }
    }

    /// Largest weight among the merged criteria.
    #[must_use]
    pub fn max_weight(&self) -> f64 {
        self.priority_order
            .iter()
            .map(|&c| self.weights.get(c))
            .fold(0.0, f64::max)
    }

    /// Position of `criterion` in the priority order (lower is stronger).
    fn rank(&self, criterion: Criterion) -> usize {
        rank(&self.priority_order, criterion)
    }
}

fn rank(priority_order: &[Criterion], criterion: Criterion) -> usize {
    priority_order
        .iter()
        .position(|&c| c == criterion)
        .unwrap_or(usize::MAX)
}

/// Groups produced by each single-criterion grouper.
#[derive(Debug, Clone, Default)]
pub struct CriterionGroups {
    /// Exact-content groups
    pub exact: Vec<Group>,
    /// Filename groups
    pub filename: Vec<Group>,
    /// Content-similarity groups
    pub similarity: Vec<Group>,
}

impl CriterionGroups {
    /// Groups of `criterion`.
    #[must_use]
    pub fn get(&self, criterion: Criterion) -> &[Group] {
        match criterion {
            Criterion::Exact => &self.exact,
            Criterion::Filename => &self.filename,
            Criterion::Similarity => &self.similarity,
        }
    }
}

/// The part of a group's metadata the fold rule looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupMeta {
    /// Source criterion, or the primary criterion of a merged group
    pub criterion: Criterion,
    /// Group confidence
    pub confidence: f64,
}

/// Outcome of offering a source group to an existing owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldDecision {
    /// Fold, and the candidate's criterion becomes primary.
    Promote,
    /// Fold, keeping the owner's primary criterion.
    Corroborate,
    /// Leave the owner unchanged.
    Skip,
}

/// Decide how a candidate group folds into the owner of one of its files.
///
/// - strictly higher priority than the owner's primary: [`Promote`](FoldDecision::Promote)
/// - equal priority and strictly higher confidence: [`Promote`](FoldDecision::Promote)
/// - equal priority otherwise: [`Skip`](FoldDecision::Skip)
/// - lower priority: [`Corroborate`](FoldDecision::Corroborate)
///
/// A lower-ranked criterion is still recorded in `criteria_used` and its
/// detail kept, but the primary criterion does not change.
///
/// # Example
///
/// ```
/// use dupesieve::duplicates::{fold_decision, Criterion, FoldDecision, GroupMeta};
///
/// let order = [Criterion::Exact, Criterion::Similarity, Criterion::Filename];
/// let owner = GroupMeta { criterion: Criterion::Exact, confidence: 1.0 };
/// let candidate = GroupMeta { criterion: Criterion::Filename, confidence: 0.5 };
/// assert_eq!(fold_decision(owner, candidate, &order), FoldDecision::Corroborate);
/// ```
#[must_use]
pub fn fold_decision(
    owner: GroupMeta,
    candidate: GroupMeta,
    priority_order: &[Criterion],
) -> FoldDecision {
    let owner_rank = rank(priority_order, owner.criterion);
    let candidate_rank = rank(priority_order, candidate.criterion);

    match candidate_rank.cmp(&owner_rank) {
        std::cmp::Ordering::Less => FoldDecision::Promote,
        std::cmp::Ordering::Equal if candidate.confidence > owner.confidence => {
            FoldDecision::Promote
        }
        std::cmp::Ordering::Equal => FoldDecision::Skip,
        std::cmp::Ordering::Greater => FoldDecision::Corroborate,
    }
}

/// Confidence of a single-criterion group.
///
/// `weight / max_weight`, scaled up by 5% per file beyond the second (capped
/// at 1.2x), multiplied by the group's average similarity for filename and
/// similarity groups or by a fixed 1.1 boost for exact groups, and clamped
/// to `[0, 1]`. Merged groups return their stored confidence.
#[must_use]
pub fn group_confidence(group: &Group, weights: &CriterionWeights, max_weight: f64) -> f64 {
    let Some(detail) = group.criterion_detail() else {
        return group.confidence().unwrap_or(0.0);
    };

    let base = if max_weight > 0.0 {
        weights.get(detail.criterion()) / max_weight
    } else {
        0.0
    };
    let extra_files = group.len().saturating_sub(2) as f64;
    let size_factor = (1.0 + SIZE_STEP * extra_files).min(SIZE_CAP);
    let kind_factor = match detail {
        CriterionDetail::Exact { .. } => EXACT_BOOST,
        CriterionDetail::Filename { avg_similarity, .. }
        | CriterionDetail::Similarity { avg_similarity } => *avg_similarity,
    };

    (base * size_factor * kind_factor).clamp(0.0, 1.0)
}

#[derive(Debug)]
struct MergedGroup {
    files: Vec<FileRecord>,
    detail: MergeDetail,
    discarded: bool,
}

impl MergedGroup {
    fn seed(files: Vec<FileRecord>, source: &CriterionDetail, confidence: f64) -> Self {
        let criterion = source.criterion();
        Self {
            files,
            detail: MergeDetail {
                primary_criterion: criterion,
                criteria_used: BTreeSet::from([criterion]),
                confidence,
                details: vec![source.clone()],
            },
            discarded: false,
        }
    }

    fn meta(&self) -> GroupMeta {
        GroupMeta {
            criterion: self.detail.primary_criterion,
            confidence: self.detail.confidence,
        }
    }

    fn fold(&mut self, decision: FoldDecision, source: &CriterionDetail, confidence: f64) {
        if decision == FoldDecision::Skip {
            return;
        }
        let criterion = source.criterion();
        self.detail.criteria_used.insert(criterion);
        self.detail.details.push(source.clone());
        self.detail.confidence = ((self.detail.confidence + confidence) / 2.0).clamp(0.0, 1.0);
        if decision == FoldDecision::Promote {
            self.detail.primary_criterion = criterion;
        }
    }
}

/// Merge single-criterion groups into multi-criteria groups.
///
/// Only criteria listed in `config.priority_order` take part.
///
/// # Errors
///
/// Returns [`DetectError::Cancelled`] if `ctx` observes cancellation between
/// source groups.
pub fn merge_groups(
    sources: &CriterionGroups,
    config: &MergeConfig,
    ctx: &RunContext,
) -> Result<Vec<Group>, DetectError> {
    let total: usize = config
        .priority_order
        .iter()
        .map(|&c| sources.get(c).len())
        .sum();
    ctx.phase_start(Phase::Merging, total);

    let max_weight = config.max_weight();
    let mut merged: Vec<MergedGroup> = Vec::new();
    let mut owners: HashMap<PathBuf, usize> = HashMap::new();
    let mut completed = 0usize;

    for &criterion in &config.priority_order {
        let pass_start = merged.len();

        for source in sources.get(criterion) {
            ctx.check_cancelled()?;
            completed += 1;

            let Some(detail) = source.criterion_detail() else {
                continue;
            };
            let confidence = group_confidence(source, &config.weights, max_weight);
            let candidate = GroupMeta {
                criterion,
                confidence,
            };

            let mut visited: Vec<usize> = Vec::new();
            let mut fresh: Vec<FileRecord> = Vec::new();
            for file in &source.files {
                let Some(&owner) = owners.get(&file.path) else {
                    fresh.push(file.clone());
                    continue;
                };
                if visited.contains(&owner) {
                    continue;
                }
                visited.push(owner);

                let target = &mut merged[owner];
                let decision = fold_decision(target.meta(), candidate, &config.priority_order);
                log::debug!(
                    "Fold {} group into merged group #{} (primary {}): {:?}",
                    criterion,
                    owner,
                    target.detail.primary_criterion,
                    decision
                );
                target.fold(decision, detail, confidence);
            }

            if !fresh.is_empty() {
                let id = merged.len();
                for file in &fresh {
                    owners.insert(file.path.clone(), id);
                }
                merged.push(MergedGroup::seed(fresh, detail, confidence));
            }

            ctx.report(
                completed,
                total,
                source.files.first().map(|f| f.name.as_str()),
            );
        }

        for group in &mut merged[pass_start..] {
            if group.files.len() < 2 {
                group.discarded = true;
                for file in &group.files {
                    owners.remove(&file.path);
                }
            }
        }
        log::debug!(
            "Merge pass {} (rank {}): {} merged groups so far",
            criterion,
            config.rank(criterion),
            merged.iter().filter(|g| !g.discarded).count()
        );
    }

    let mut groups: Vec<Group> = merged
        .into_iter()
        .filter(|g| !g.discarded && g.files.len() > 1)
        .map(|g| Group::merged(g.files, g.detail))
        .collect();

    groups.sort_by(|a, b| {
        let ca = a.confidence().unwrap_or(0.0);
        let cb = b.confidence().unwrap_or(0.0);
        cb.total_cmp(&ca)
            .then_with(|| a.files[0].path.cmp(&b.files[0].path))
    });

    ctx.phase_end(Phase::Merging);
    log::info!("Merged into {} multi-criteria groups", groups.len());
    Ok(groups)
}
