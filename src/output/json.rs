//! JSON output formatter for detection reports.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "scan_mode": "multi-criteria",
//!   "thresholds_used": { "similarity": 0.8, "filename": 0.85, "filename_mode": "smart" },
//!   "groups": [
//!     {
//!       "kind": "multi-criteria",
//!       "files": ["/photos/a.jpg", "/photos/a (1).jpg"],
//!       "total_size": 2048,
//!       "wasted_space": 1024,
//!       "suggested_keeper": "/photos/a.jpg",
//!       "detail": {
//!         "primary_criterion": "exact",
//!         "criteria_used": ["exact", "filename"],
//!         "confidence": 0.77,
//!         "details": [{ "criterion": "exact", "digest": "af13..." }]
//!       }
//!     }
//!   ],
//!   "unreadable": [{ "path": "/photos/locked.jpg", "error": "Permission denied: ..." }],
//!   "summary": {
//!     "total_files": 120,
//!     "group_count": 1,
//!     "duplicate_files": 1,
//!     "wasted_space": 1024,
//!     "duration_secs": 0.42,
//!     "exit_code": 3,
//!     "exit_code_name": "DS003"
//!   }
//! }
//! ```
//!
//! # Example
//!
//! ```
//! use dupesieve::duplicates::{DetectionParams, DuplicateDetector};
//! use dupesieve::error::ExitCode;
//! use dupesieve::output::JsonOutput;
//! use dupesieve::scanner::MemoryContentSource;
//!
//! let detector = DuplicateDetector::with_defaults().unwrap();
//! let report = detector
//!     .detect(&[], &MemoryContentSource::new(), &DetectionParams::exact())
//!     .unwrap();
//!
//! let output = JsonOutput::new(&report, 0, ExitCode::NoDuplicates);
//! assert!(output.to_json().unwrap().starts_with('{'));
//! ```

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::duplicates::{
    DetectionMode, DetectionReport, Group, GroupDetail, GroupKind, ThresholdsUsed,
};
use crate::error::ExitCode;
use crate::scanner::ReadError;

/// One group in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonGroup {
    /// How the group was found
    pub kind: GroupKind,
    /// Member paths, in group order
    pub files: Vec<String>,
    /// Sum of member sizes in bytes
    pub total_size: u64,
    /// Bytes freed by keeping only the suggested keeper
    pub wasted_space: u64,
    /// Oldest member, then shortest path
    pub suggested_keeper: Option<String>,
    /// Kind-specific metadata
    pub detail: GroupDetail,
}

impl JsonGroup {
    /// Convert a group.
    #[must_use]
    pub fn from_group(group: &Group) -> Self {
        Self {
            kind: group.kind(),
            files: group.files.iter().map(|f| display_path(&f.path)).collect(),
            total_size: group.total_size(),
            wasted_space: group.wasted_space(),
            suggested_keeper: group.suggested_keeper().map(|f| display_path(&f.path)),
            detail: group.detail.clone(),
        }
    }
}

/// Summary statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Files in the batch
    pub total_files: usize,
    /// Number of groups
    pub group_count: usize,
    /// Files that belong to some group
    pub grouped_files: usize,
    /// Grouped files beyond one keeper per group
    pub duplicate_files: usize,
    /// Reclaimable bytes
    pub wasted_space: u64,
    /// Files whose content was read, or not needed
    pub readable_files: usize,
    /// Files whose content could not be read
    pub unreadable_files: usize,
    /// Entries skipped while enumerating the directory
    pub scan_errors: usize,
    /// Wall-clock time of detection in seconds
    pub duration_secs: f64,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "DS000")
    pub exit_code_name: String,
}

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// Mode of the run
    pub scan_mode: DetectionMode,
    /// Thresholds that applied
    pub thresholds_used: ThresholdsUsed,
    /// Groups in report order
    pub groups: Vec<JsonGroup>,
    /// Files whose content could not be read
    pub unreadable: Vec<ReadError>,
    /// Summary statistics
    pub summary: JsonSummary,
}

impl JsonOutput {
    /// Build the JSON view of a report.
    ///
    /// `scan_errors` counts entries the directory walk skipped.
    #[must_use]
    pub fn new(report: &DetectionReport, scan_errors: usize, exit_code: ExitCode) -> Self {
        let summary = &report.summary;
        Self {
            scan_mode: report.scan_mode,
            thresholds_used: report.thresholds_used,
            groups: report.groups.iter().map(JsonGroup::from_group).collect(),
            unreadable: report.unreadable.clone(),
            summary: JsonSummary {
                total_files: report.total_files,
                group_count: summary.group_count,
                grouped_files: summary.grouped_files,
                duplicate_files: summary.duplicate_files,
                wasted_space: summary.wasted_space,
                readable_files: summary.readable_files,
                unreadable_files: summary.unreadable_files,
                scan_errors,
                duration_secs: report.duration.as_secs_f64(),
                exit_code: exit_code.as_i32(),
                exit_code_name: exit_code.code_prefix().to_string(),
            },
        }
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
