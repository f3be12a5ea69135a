//! Filename grouping.
//!
//! # Overview
//!
//! Four comparison modes, from strictest to most permissive:
//!
//! | Mode | Match when | Score |
//! |------|-----------|-------|
//! | `exact` | full names byte-identical | 1.0 |
//! | `exact-base` | case-folded base names equal | 1.0 same extension, 0.95 otherwise |
//! | `smart` | as `exact-base`, then decoration-free base names equal or one is a variation of the other | 0.90 same extension, 0.85 otherwise |
//! | `fuzzy` | as `smart`, then normalized Levenshtein similarity of base names | `1 - d / max_len`, +0.1 for matching extensions above 0.6 |
//!
//! Grouping is greedy: each file not yet grouped seeds a group and absorbs
//! every later ungrouped file scoring at or above the threshold against it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::finder::DetectError;
use super::groups::{CriterionDetail, Group};
use crate::progress::{Phase, RunContext};
use crate::scanner::{profile, FileRecord, FilenameProfile};

const EXACT_BASE_SAME_EXT: f64 = 1.0;
const EXACT_BASE_OTHER_EXT: f64 = 0.95;
const NORMALIZED_SAME_EXT: f64 = 0.90;
const NORMALIZED_OTHER_EXT: f64 = 0.85;
const FUZZY_EXTENSION_BOOST: f64 = 0.1;
const FUZZY_BOOST_FLOOR: f64 = 0.6;

/// Filename comparison mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FilenameMode {
    /// Case-sensitive full-name equality
    Exact,
    /// Case-insensitive base-name equality
    ExactBase,
    /// Base-name equality after stripping decorations
    #[default]
    Smart,
    /// Smart matching with typo tolerance
    Fuzzy,
}

impl FilenameMode {
    /// Kebab-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::ExactBase => "exact-base",
            Self::Smart => "smart",
            Self::Fuzzy => "fuzzy",
        }
    }
}

impl fmt::Display for FilenameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilenameMode {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "exact" => Ok(Self::Exact),
            "exact-base" | "base" => Ok(Self::ExactBase),
            "smart" => Ok(Self::Smart),
            "fuzzy" => Ok(Self::Fuzzy),
            other => Err(DetectError::InvalidParameters(format!(
                "unknown filename mode '{other}' (expected exact, exact-base, smart or fuzzy)"
            ))),
        }
    }
}

/// A file name together with its derived profile.
#[derive(Debug, Clone)]
pub struct ProfiledName<'a> {
    name: &'a str,
    profile: FilenameProfile,
}

impl<'a> ProfiledName<'a> {
    /// Profile `name`.
    #[must_use]
    pub fn new(name: &'a str) -> Self {
        Self {
            name,
            profile: profile(name),
        }
    }

    /// Derived profile.
    #[must_use]
    pub fn profile(&self) -> &FilenameProfile {
        &self.profile
    }
}

/// Score two file names under `mode`.
///
/// # Example
///
/// ```
/// use dupesieve::duplicates::{filename_similarity, FilenameMode};
///
/// assert_eq!(filename_similarity("report.txt", "Report.txt", FilenameMode::Exact), 0.0);
/// assert_eq!(filename_similarity("report.txt", "Report.txt", FilenameMode::ExactBase), 1.0);
/// assert!(filename_similarity("photo.jpg", "photo (1).jpg", FilenameMode::Smart) >= 0.9);
/// ```
#[must_use]
pub fn filename_similarity(a: &str, b: &str, mode: FilenameMode) -> f64 {
    profiled_similarity(&ProfiledName::new(a), &ProfiledName::new(b), mode)
}

/// Score two already-profiled names under `mode`.
#[must_use]
pub fn profiled_similarity(a: &ProfiledName<'_>, b: &ProfiledName<'_>, mode: FilenameMode) -> f64 {
    if mode == FilenameMode::Exact {
        return if a.name == b.name { 1.0 } else { 0.0 };
    }

    let (pa, pb) = (&a.profile, &b.profile);
    let same_ext = pa.extension == pb.extension;

    if pa.raw_base_name == pb.raw_base_name {
        return if same_ext {
            EXACT_BASE_SAME_EXT
        } else {
            EXACT_BASE_OTHER_EXT
        };
    }
    if mode == FilenameMode::ExactBase {
        return 0.0;
    }

    if is_variation(pa, pb) {
        return if same_ext {
            NORMALIZED_SAME_EXT
        } else {
            NORMALIZED_OTHER_EXT
        };
    }
    if mode == FilenameMode::Smart {
        return 0.0;
    }

    fuzzy_score(&pa.raw_base_name, &pb.raw_base_name, same_ext)
}

/// Normalized bases agree, or one raw base reduces to the other.
fn is_variation(a: &FilenameProfile, b: &FilenameProfile) -> bool {
    let a_norm = a.normalized_base_name.as_str();
    let b_norm = b.normalized_base_name.as_str();
    if a_norm.is_empty() || b_norm.is_empty() {
        return false;
    }
    a_norm == b_norm || a_norm == b.raw_base_name || b_norm == a.raw_base_name
}

fn fuzzy_score(a: &str, b: &str, same_ext: bool) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 0.0;
    }
    let distance = strsim::levenshtein(a, b);
    let base = 1.0 - distance as f64 / max_len as f64;
    if same_ext && base > FUZZY_BOOST_FLOOR {
        (base + FUZZY_EXTENSION_BOOST).min(1.0)
    } else {
        base
    }
}

/// Group files by filename.
///
/// Files inside a group are sorted by name then path; groups are sorted by
/// their first file name. Progress is reported in comparisons against the
/// theoretical `n * (n - 1) / 2` total, and cancellation is polled before
/// each seed row.
///
/// # Errors
///
/// Returns [`DetectError::Cancelled`] if `ctx` observes cancellation.
pub fn group_by_filename(
    files: &[&FileRecord],
    mode: FilenameMode,
    threshold: f64,
    ctx: &RunContext,
) -> Result<Vec<Group>, DetectError> {
    let n = files.len();
    let total = n * n.saturating_sub(1) / 2;
    ctx.phase_start(Phase::FilenameGrouping, total);

    let names: Vec<ProfiledName<'_>> = files.iter().map(|f| ProfiledName::new(&f.name)).collect();
    let mut processed = vec![false; n];
    let mut completed = 0usize;
    let mut groups = Vec::new();

    for i in 0..n {
        ctx.check_cancelled()?;

        if !processed[i] {
            processed[i] = true;
            let mut members = vec![i];
            for j in (i + 1)..n {
                if processed[j] {
                    continue;
                }
                if profiled_similarity(&names[i], &names[j], mode) >= threshold {
                    processed[j] = true;
                    members.push(j);
                }
            }

            if members.len() > 1 {
                groups.push(build_group(files, &names, members, i, mode));
            }
        }

        completed += n - 1 - i;
        ctx.report(completed, total, Some(&files[i].name));
    }

    groups.sort_by(|a, b| {
        let (fa, fb) = (&a.files[0], &b.files[0]);
        fa.name.cmp(&fb.name).then_with(|| fa.path.cmp(&fb.path))
    });

    ctx.phase_end(Phase::FilenameGrouping);
    log::info!(
        "Filename grouping ({}): {} groups from {} files",
        mode,
        groups.len(),
        n
    );
    Ok(groups)
}

fn build_group(
    files: &[&FileRecord],
    names: &[ProfiledName<'_>],
    mut members: Vec<usize>,
    seed: usize,
    mode: FilenameMode,
) -> Group {
    let mut sum = 0.0;
    let mut pairs = 0usize;
    for (pos, &a) in members.iter().enumerate() {
        for &b in &members[pos + 1..] {
            sum += profiled_similarity(&names[a], &names[b], mode);
            pairs += 1;
        }
    }
    let avg_similarity = if pairs == 0 { 0.0 } else { sum / pairs as f64 };

    members.sort_by(|&a, &b| {
        files[a]
            .name
            .cmp(&files[b].name)
            .then_with(|| files[a].path.cmp(&files[b].path))
    });

    let seed_profile = names[seed].profile();
    log::debug!(
        "Filename group '{}': {} files, avg similarity {:.3}",
        seed_profile.normalized_base_name,
        members.len(),
        avg_similarity
    );

    Group::single(
        members.iter().map(|&m| files[m].clone()).collect(),
        CriterionDetail::Filename {
            normalized_base_name: seed_profile.normalized_base_name.clone(),
            extension: seed_profile.extension.clone(),
            avg_similarity,
        },
    )
}
