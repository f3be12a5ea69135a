//! Scanner module for per-file artifacts and the file model.
//!
//! This module provides functionality for:
//! - The [`FileRecord`] batch model and the [`ContentSource`] byte accessor
//! - Content digests with BLAKE3 ([`hasher`])
//! - MinHash similarity signatures over byte shingles ([`shingle`])
//! - Filename profiling and decoration stripping ([`filename`])
//! - Directory enumeration for the command-line front-end ([`walker`])
//!
//! # Example
//!
//! ```
//! use dupesieve::scanner::{ContentSource, FileRecord, MemoryContentSource};
//! use std::io::Read;
//! use std::time::SystemTime;
//!
//! let record = FileRecord::new("/docs/a.txt", 5, SystemTime::UNIX_EPOCH);
//! let mut source = MemoryContentSource::new();
//! source.insert(&record.path, b"hello".to_vec());
//!
//! let mut buf = Vec::new();
//! source.open(&record).unwrap().read_to_end(&mut buf).unwrap();
//! assert_eq!(buf, b"hello");
//! ```

pub mod filename;
pub mod hasher;
pub mod shingle;
pub mod walker;

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;

pub use filename::{profile, DecorationKind, FilenameProfile};
pub use hasher::{hash_to_hex, ContentDigest, DigestBuilder, Hasher};
pub use shingle::{MinHasher, ShingleConfig, SignatureBuilder, SimilaritySignature};
pub use walker::Walker;

/// One file of a detection batch.
///
/// Records are owned by the caller and are immutable for the duration of a
/// run. `path` is the unique key within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    /// Unique path of the file within the batch
    pub path: PathBuf,
    /// File name including extension
    pub name: String,
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    #[serde(serialize_with = "serialize_system_time")]
    pub last_modified: SystemTime,
}

impl FileRecord {
    /// Create a record, deriving `name` from the last path component.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, size: u64, last_modified: SystemTime) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            name,
            size,
            last_modified,
        }
    }

    /// Create a record with an explicit display name.
    #[must_use]
    pub fn with_name(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        size: u64,
        last_modified: SystemTime,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            size,
            last_modified,
        }
    }
}

fn serialize_system_time<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let datetime: chrono::DateTime<chrono::Utc> = (*time).into();
    serializer.serialize_str(&datetime.to_rfc3339())
}

/// Byte-content accessor for a [`FileRecord`].
///
/// The engine reads each file at most once, sequentially, through this trait.
/// Implementations must be shareable across worker threads.
pub trait ContentSource: Send + Sync {
    /// Open a sequential reader over the full content of `record`.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError`] when the bytes cannot be obtained.
    fn open(&self, record: &FileRecord) -> Result<Box<dyn Read + Send + '_>, ReadError>;
}

/// Reads file content from the local filesystem using the record path.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsContentSource;

impl ContentSource for FsContentSource {
    fn open(&self, record: &FileRecord) -> Result<Box<dyn Read + Send + '_>, ReadError> {
        let file = File::open(&record.path).map_err(|e| ReadError::from_io(&record.path, e))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// In-memory content keyed by path.
///
/// Useful for callers that already hold file bytes and for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryContentSource {
    contents: HashMap<PathBuf, Arc<[u8]>>,
}

impl MemoryContentSource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the content for a path, replacing any previous content.
    pub fn insert(&mut self, path: impl AsRef<Path>, bytes: impl Into<Vec<u8>>) {
        self.contents
            .insert(path.as_ref().to_path_buf(), Arc::from(bytes.into()));
    }

    /// Number of registered paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contents.len()
    }

    /// Whether no content is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}

impl ContentSource for MemoryContentSource {
    fn open(&self, record: &FileRecord) -> Result<Box<dyn Read + Send + '_>, ReadError> {
        match self.contents.get(&record.path) {
            Some(bytes) => Ok(Box::new(Cursor::new(Arc::clone(bytes)))),
            None => Err(ReadError::NotFound(record.path.clone())),
        }
    }
}

/// Configuration for directory walking.
///
/// Controls filtering and symlink handling of the command-line front-end.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Follow symbolic links during traversal.
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Minimum file size to include (in bytes).
    pub min_size: Option<u64>,

    /// Maximum file size to include (in bytes).
    pub max_size: Option<u64>,

    /// Glob patterns to ignore (gitignore-style).
    pub ignore_patterns: Vec<String>,
}

/// Errors that can occur during directory enumeration.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// A file whose bytes could not be obtained.
///
/// The file is excluded from digest and signature based grouping but the run
/// continues.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ReadError {
    /// The file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: Arc<io::Error>,
    },
}

impl ReadError {
    /// Classify an I/O error for `path`.
    #[must_use]
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: Arc::new(err),
            },
        }
    }

    /// Path of the file that failed.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p) | Self::PermissionDenied(p) => p,
            Self::Io { path, .. } => path,
        }
    }
}

impl Serialize for ReadError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ReadError", 2)?;
        state.serialize_field("path", &self.path())?;
        state.serialize_field("error", &self.to_string())?;
        state.end()
    }
}
