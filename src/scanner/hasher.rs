//! BLAKE3 content digests with streaming support.
//!
//! # Overview
//!
//! Content equality throughout the engine is defined as digest equality.
//! BLAKE3 is collision resistant, so two different byte sequences practically
//! never share a [`ContentDigest`].
//!
//! # Example
//!
//! ```
//! use dupesieve::scanner::Hasher;
//!
//! let hasher = Hasher::new();
//! let a = hasher.digest(b"same bytes");
//! let b = hasher.digest(b"same bytes");
//! assert_eq!(a, b);
//! assert_ne!(a, hasher.digest(b"other bytes"));
//! ```

use std::fmt;
use std::io::{self, Read};

use serde::{Serialize, Serializer};

/// Read buffer size for streaming digests (64KB).
pub const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Fixed-length BLAKE3 digest of a file's full content.
///
/// Used only for equality and as a map key, never for ordering.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Wrap raw digest bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Digest as a 64-character lowercase hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hash_to_hex(&self.0)
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Computes content digests.
#[derive(Debug, Clone)]
pub struct Hasher {
    buffer_size: usize,
}

impl Hasher {
    /// Create a hasher with the default read buffer size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer_size: READ_BUFFER_SIZE,
        }
    }

    /// Use a custom read buffer size (minimum 1 byte).
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Digest an in-memory byte slice.
    #[must_use]
    pub fn digest(&self, bytes: &[u8]) -> ContentDigest {
        ContentDigest(*blake3::hash(bytes).as_bytes())
    }

    /// Digest a sequential stream until EOF.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if reading fails. Interrupted reads
    /// are retried.
    pub fn digest_reader<R: Read + ?Sized>(&self, reader: &mut R) -> io::Result<ContentDigest> {
        let mut builder = self.builder();
        let mut buf = vec![0u8; self.buffer_size];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            builder.update(&buf[..n]);
        }
        Ok(builder.finish())
    }

    /// Start an incremental digest, fed chunk by chunk.
    #[must_use]
    pub fn builder(&self) -> DigestBuilder {
        DigestBuilder {
            inner: blake3::Hasher::new(),
        }
    }

    /// Read buffer size in bytes.
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Incremental digest state.
#[derive(Debug, Clone)]
pub struct DigestBuilder {
    inner: blake3::Hasher,
}

impl DigestBuilder {
    /// Feed the next chunk of content.
    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
    }

    /// Finalize the digest.
    #[must_use]
    pub fn finish(self) -> ContentDigest {
        ContentDigest(*self.inner.finalize().as_bytes())
    }
}

/// Convert a 32-byte hash to a lowercase hex string.
#[must_use]
pub fn hash_to_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}
