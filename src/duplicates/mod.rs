//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Exact-content grouping by digest ([`exact`])
//! - Filename grouping in four modes ([`filename`])
//! - Content-similarity clustering ([`similarity`])
//! - Multi-criteria merging with confidence scores ([`merge`])
//! - Parallel artifact computation ([`scheduler`])
//! - The detection engine tying them together ([`finder`])

pub mod exact;
pub mod filename;
pub mod finder;
pub mod groups;
pub mod merge;
pub mod scheduler;
pub mod similarity;

pub use exact::group_exact;
pub use filename::{
    filename_similarity, group_by_filename, profiled_similarity, FilenameMode, ProfiledName,
};
pub use finder::{
    DetectError, DetectionMode, DetectionParams, DetectionReport, DetectionSummary,
    DetectorConfig, DuplicateDetector, ThresholdsUsed, DEFAULT_FILENAME_THRESHOLD,
    DEFAULT_PROGRESS_INTERVAL, DEFAULT_SIMILARITY_THRESHOLD,
};
pub use groups::{Criterion, CriterionDetail, Group, GroupDetail, GroupKind, MergeDetail};
pub use merge::{
    fold_decision, group_confidence, merge_groups, CriterionGroups, CriterionWeights,
    FoldDecision, GroupMeta, MergeConfig,
};
pub use scheduler::{
    default_hash_threads, default_signature_threads, ArtifactNeeds, ArtifactScheduler,
    ArtifactSet,
};
pub use similarity::{cluster_by_similarity, UnionFind};
