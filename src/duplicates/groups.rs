//! Duplicate group model and group statistics.
//!
//! # Overview
//!
//! Every grouper produces [`Group`] values: an ordered list of at least two
//! [`FileRecord`]s that share a detection relationship, plus metadata that
//! depends on how the group was found ([`GroupDetail`]).
//!
//! Groups also carry the statistics a downstream removal step needs (total
//! size, wasted space, a suggested file to keep). The engine itself never
//! acts on them.
//!
//! # Example
//!
//! ```
//! use dupesieve::duplicates::{CriterionDetail, Group, GroupKind};
//! use dupesieve::scanner::{FileRecord, Hasher};
//! use std::time::{Duration, SystemTime};
//!
//! let old = SystemTime::UNIX_EPOCH + Duration::from_secs(10);
//! let new = SystemTime::UNIX_EPOCH + Duration::from_secs(20);
//! let group = Group::single(
//!     vec![
//!         FileRecord::new("/b/report.txt", 100, new),
//!         FileRecord::new("/a/report.txt", 100, old),
//!     ],
//!     CriterionDetail::Exact { digest: Hasher::new().digest(b"report") },
//! );
//!
//! assert_eq!(group.kind(), GroupKind::Exact);
//! assert_eq!(group.wasted_space(), 100);
//! assert_eq!(group.suggested_keeper().unwrap().path.to_str(), Some("/a/report.txt"));
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::finder::DetectError;
use crate::scanner::{ContentDigest, FileRecord};

/// One detection strategy.
///
/// The declaration order is only used for set ordering; priority between
/// criteria is always given explicitly by a priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    /// Identical content digest
    Exact,
    /// Similar file names
    Filename,
    /// Similar content (MinHash estimate)
    Similarity,
}

impl Criterion {
    /// All criteria.
    pub const ALL: [Criterion; 3] = [Criterion::Exact, Criterion::Filename, Criterion::Similarity];

    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Filename => "filename",
            Self::Similarity => "similarity",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Criterion {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" | "content" | "hash" => Ok(Self::Exact),
            "filename" | "name" => Ok(Self::Filename),
            "similarity" | "similar" => Ok(Self::Similarity),
            other => Err(DetectError::InvalidParameters(format!(
                "unknown criterion '{other}' (expected exact, filename or similarity)"
            ))),
        }
    }
}

/// How a group was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupKind {
    /// Exact content match
    Exact,
    /// Filename match
    Filename,
    /// Content similarity match
    Similarity,
    /// Reconciled result of several strategies
    MultiCriteria,
}

impl From<Criterion> for GroupKind {
    fn from(criterion: Criterion) -> Self {
        match criterion {
            Criterion::Exact => Self::Exact,
            Criterion::Filename => Self::Filename,
            Criterion::Similarity => Self::Similarity,
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exact => "exact",
            Self::Filename => "filename",
            Self::Similarity => "similarity",
            Self::MultiCriteria => "multi-criteria",
        })
    }
}

/// Metadata produced by a single grouper.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "criterion", rename_all = "lowercase")]
pub enum CriterionDetail {
    /// Shared content digest.
    Exact {
        /// Digest of every file in the group
        digest: ContentDigest,
    },
    /// Filename relationship.
    Filename {
        /// Decoration-free base name of the seed file
        normalized_base_name: String,
        /// Extension of the seed file
        extension: String,
        /// Mean pairwise filename score
        avg_similarity: f64,
    },
    /// Content similarity relationship.
    Similarity {
        /// Mean pairwise signature similarity
        avg_similarity: f64,
    },
}

impl CriterionDetail {
    /// The strategy that produced this detail.
    #[must_use]
    pub fn criterion(&self) -> Criterion {
        match self {
            Self::Exact { .. } => Criterion::Exact,
            Self::Filename { .. } => Criterion::Filename,
            Self::Similarity { .. } => Criterion::Similarity,
        }
    }

    /// Mean pairwise score, for filename and similarity details.
    #[must_use]
    pub fn avg_similarity(&self) -> Option<f64> {
        match self {
            Self::Exact { .. } => None,
            Self::Filename { avg_similarity, .. } | Self::Similarity { avg_similarity } => {
                Some(*avg_similarity)
            }
        }
    }
}

/// Metadata of a multi-criteria group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeDetail {
    /// Criterion that currently leads the group
    pub primary_criterion: Criterion,
    /// Every criterion that implicated files of the group
    pub criteria_used: BTreeSet<Criterion>,
    /// Corroboration strength in `[0, 1]`
    pub confidence: f64,
    /// Per-criterion metadata, in fold order
    pub details: Vec<CriterionDetail>,
}

/// Kind-specific group metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GroupDetail {
    /// Group produced by one grouper
    Single(CriterionDetail),
    /// Group produced by the multi-criteria merger
    MultiCriteria(MergeDetail),
}

/// A set of files sharing a detection relationship.
///
/// Invariant: a group returned by the engine always holds at least two files.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    /// Member files, in deterministic order
    pub files: Vec<FileRecord>,
    /// Kind-specific metadata
    pub detail: GroupDetail,
}

impl Group {
    /// Create a group produced by a single grouper.
    #[must_use]
    pub fn single(files: Vec<FileRecord>, detail: CriterionDetail) -> Self {
        Self {
            files,
            detail: GroupDetail::Single(detail),
        }
    }

    /// Create a multi-criteria group.
    #[must_use]
    pub fn merged(files: Vec<FileRecord>, detail: MergeDetail) -> Self {
        Self {
            files,
            detail: GroupDetail::MultiCriteria(detail),
        }
    }

    /// How the group was found.
    #[must_use]
    pub fn kind(&self) -> GroupKind {
        match &self.detail {
            GroupDetail::Single(d) => d.criterion().into(),
            GroupDetail::MultiCriteria(_) => GroupKind::MultiCriteria,
        }
    }

    /// Single-grouper metadata, if any.
    #[must_use]
    pub fn criterion_detail(&self) -> Option<&CriterionDetail> {
        match &self.detail {
            GroupDetail::Single(d) => Some(d),
            GroupDetail::MultiCriteria(_) => None,
        }
    }

    /// Multi-criteria metadata, if any.
    #[must_use]
    pub fn merge_detail(&self) -> Option<&MergeDetail> {
        match &self.detail {
            GroupDetail::Single(_) => None,
            GroupDetail::MultiCriteria(m) => Some(m),
        }
    }

    /// Shared content digest of an exact group.
    #[must_use]
    pub fn digest(&self) -> Option<ContentDigest> {
        match self.criterion_detail() {
            Some(CriterionDetail::Exact { digest }) => Some(*digest),
            _ => None,
        }
    }

    /// Mean pairwise score of a filename or similarity group.
    #[must_use]
    pub fn avg_similarity(&self) -> Option<f64> {
        self.criterion_detail().and_then(CriterionDetail::avg_similarity)
    }

    /// Confidence of a multi-criteria group.
    #[must_use]
    pub fn confidence(&self) -> Option<f64> {
        self.merge_detail().map(|m| m.confidence)
    }

    /// Number of files in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Number of files beyond the one that would be kept.
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.files.len().saturating_sub(1)
    }

    /// Total size of all files in this group.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// Space that removing every file but the suggested keeper would free.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        let keeper = self.suggested_keeper().map_or(0, |f| f.size);
        self.total_size().saturating_sub(keeper)
    }

    /// The file a removal step should keep: oldest modification time, then
    /// shortest path, then lexicographically smallest path.
    #[must_use]
    pub fn suggested_keeper(&self) -> Option<&FileRecord> {
        self.files.iter().min_by(|a, b| {
            a.last_modified
                .cmp(&b.last_modified)
                .then_with(|| a.path.as_os_str().len().cmp(&b.path.as_os_str().len()))
                .then_with(|| a.path.cmp(&b.path))
        })
    }

    /// Paths of all member files.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }

    /// Whether `path` is a member of this group.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.files.iter().any(|f| f.path == path)
    }
}
