//! Filename profiling and decoration stripping.
//!
//! A [`FilenameProfile`] is a pure function of a file name. It splits off the
//! extension, case-folds and whitespace-normalizes the base name, and strips
//! the decorations that file managers, browsers and people add to copies:
//!
//! | Kind | Examples |
//! |------|----------|
//! | [`DecorationKind::CopyMarker`] | `report - Copy`, `report copy 2`, `Copy of report` |
//! | [`DecorationKind::Counter`] | `photo (1)` |
//! | [`DecorationKind::Version`] | `plan_v2`, `plan_3.1` |
//! | [`DecorationKind::DuplicateMarker`] | `notes dup`, `notes_duplicate 2` |
//! | [`DecorationKind::Timestamp`] | `scan 2024-01-15`, `scan 2024-01-15 10-30-45` |
//! | [`DecorationKind::BracketedTag`] | `song [remastered]` |
//! | [`DecorationKind::Annotation`] | `thesis (final)` |
//!
//! # Example
//!
//! ```
//! use dupesieve::scanner::{profile, DecorationKind};
//!
//! let p = profile("Photo (1).JPG");
//! assert_eq!(p.extension, "jpg");
//! assert_eq!(p.raw_base_name, "photo (1)");
//! assert_eq!(p.normalized_base_name, "photo");
//! assert!(p.detected_patterns.contains(&DecorationKind::Counter));
//! ```

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

/// Upper bound on strip passes for pathological names.
const MAX_STRIP_PASSES: usize = 16;

/// Longest accepted extension.
const MAX_EXTENSION_LEN: usize = 10;

/// Parenthesised words that look like an extension and are kept.
const EXTENSION_LIKE: &[&str] = &[
    "pdf", "doc", "docx", "txt", "rtf", "odt", "md", "csv", "xls", "xlsx", "ppt", "pptx", "jpg",
    "jpeg", "png", "gif", "tif", "tiff", "bmp", "webp", "heic", "mp3", "mp4", "mov", "avi", "mkv",
    "wav", "flac", "zip", "rar", "7z", "tar", "gz", "html", "json", "xml",
];

/// Kind of decoration recognised in a base name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecorationKind {
    /// "copy" markers, with optional counter
    CopyMarker,
    /// Numeric counter in parentheses
    Counter,
    /// Version suffix such as `v2` or `_3.1`
    Version,
    /// "dup" / "duplicate" markers, with optional counter
    DuplicateMarker,
    /// Date or date-time stamp
    Timestamp,
    /// Tag in square brackets
    BracketedTag,
    /// Parenthetical note that is not extension-like
    Annotation,
}

/// Derived view of a file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilenameProfile {
    /// Lowercase extension without the dot; empty when there is none
    pub extension: String,
    /// Base name without extension, case-folded and whitespace-normalized
    pub raw_base_name: String,
    /// Raw base name with all recognised decorations stripped
    pub normalized_base_name: String,
    /// Decoration kinds that were stripped
    pub detected_patterns: BTreeSet<DecorationKind>,
}

struct Decoration {
    kind: DecorationKind,
    regex: Regex,
}

fn decorations() -> &'static [Decoration] {
    static DECORATIONS: OnceLock<Vec<Decoration>> = OnceLock::new();
    DECORATIONS.get_or_init(|| {
        // Order matters: dates before versions so `2024.01.15` is a timestamp.
        let table: &[(DecorationKind, &str)] = &[
            (DecorationKind::Counter, r"\s*\(\d{1,4}\)$"),
            (
                DecorationKind::CopyMarker,
                r"(?:^|[\s_\-]+)\(?copy(?:[\s_\-]*\(?\d{1,4}\)?)?\)?$",
            ),
            (DecorationKind::CopyMarker, r"^copy\s+of\s+"),
            (
                DecorationKind::DuplicateMarker,
                r"(?:^|[\s_\-]+)\(?(?:duplicate|dup)(?:[\s_\-]*\d{1,4})?\)?$",
            ),
            (
                DecorationKind::Timestamp,
                r"(?:^|[\s_\-]+)\d{4}[\-_.]\d{2}[\-_.]\d{2}(?:[\sT_\-]*(?:at\s+)?\d{1,2}[\-_.:h]\d{2}(?:[\-_.:m]\d{2}s?)?)?$",
            ),
            (
                DecorationKind::Timestamp,
                r"(?:^|[\s_\-]+)\d{2}[\-_.]\d{2}[\-_.]\d{4}$",
            ),
            (DecorationKind::Version, r"(?:^|[\s_\-]+)v\d+(?:\.\d+)*$"),
            (DecorationKind::Version, r"[\s_\-]+\d+(?:\.\d+)+$"),
            (DecorationKind::BracketedTag, r"\s*\[[^\[\]]*\]$"),
            (DecorationKind::Annotation, r"\s*\(([^()]*)\)$"),
        ];
        table
            .iter()
            .filter_map(|(kind, pattern)| match Regex::new(pattern) {
                Ok(regex) => Some(Decoration { kind: *kind, regex }),
                Err(e) => {
                    log::error!("Invalid decoration pattern {pattern:?}: {e}");
                    None
                }
            })
            .collect()
    })
}

/// Build the [`FilenameProfile`] of a file name.
#[must_use]
pub fn profile(name: &str) -> FilenameProfile {
    let folded = fold(name);
    let (base, extension) = split_extension(&folded);
    let raw_base_name = collapse_whitespace(base);

    let mut detected_patterns = BTreeSet::new();
    let mut current = raw_base_name.clone();

    for _ in 0..MAX_STRIP_PASSES {
        match strip_once(&current) {
            Some((kind, stripped)) => {
                detected_patterns.insert(kind);
                current = stripped;
            }
            None => break,
        }
    }

    FilenameProfile {
        extension: extension.to_string(),
        raw_base_name,
        normalized_base_name: current,
        detected_patterns,
    }
}

/// Strip the first matching decoration, if stripping leaves a non-empty name.
fn strip_once(base: &str) -> Option<(DecorationKind, String)> {
    for decoration in decorations() {
        let Some(caps) = decoration.regex.captures(base) else {
            continue;
        };
        if decoration.kind == DecorationKind::Annotation {
            let inner = caps.get(1).map_or("", |m| m.as_str()).trim();
            if is_extension_like(inner) {
                continue;
            }
        }
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let mut stripped = String::with_capacity(base.len());
        stripped.push_str(&base[..whole.start()]);
        stripped.push_str(&base[whole.end()..]);
        let stripped = trim_separators(&stripped);
        if !stripped.is_empty() && stripped != base {
            return Some((decoration.kind, stripped));
        }
    }
    None
}

fn fold(name: &str) -> String {
    name.trim().nfc().collect::<String>().to_lowercase()
}

fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => {
            let ext = &name[idx + 1..];
            let valid = ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
                && ext.chars().any(|c| c.is_ascii_alphabetic());
            if valid {
                (&name[..idx], ext)
            } else {
                (name, "")
            }
        }
        _ => (name, ""),
    }
}

fn is_extension_like(inner: &str) -> bool {
    match inner.strip_prefix('.') {
        Some(word) => !word.is_empty() && word.chars().all(|c| c.is_ascii_alphanumeric()),
        None => EXTENSION_LIKE.contains(&inner),
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn trim_separators(s: &str) -> String {
    collapse_whitespace(s.trim_matches(|c: char| c.is_whitespace() || matches!(c, '_' | '-' | '.')))
}
