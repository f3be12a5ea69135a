//! Byte-shingle MinHash signatures for near-duplicate detection.
//!
//! A file's content is viewed as the set of its overlapping `k`-byte windows
//! ("shingles"). For each of `N` fixed hash permutations the minimum hash over
//! all shingles is kept; the fraction of equal positions between two
//! signatures estimates the Jaccard similarity of the two shingle sets.
//!
//! The permutation set is derived from a fixed seed, so identical bytes with an
//! identical [`ShingleConfig`] always produce identical signatures, across runs
//! and processes.
//!
//! # Example
//!
//! ```
//! use dupesieve::scanner::{MinHasher, ShingleConfig};
//!
//! let minhasher = MinHasher::new(ShingleConfig::default());
//! let a = minhasher.signature(b"the quick brown fox jumps over the lazy dog");
//! let b = minhasher.signature(b"the quick brown fox jumps over the lazy dog");
//! assert_eq!(a.similarity(&b), 1.0);
//! ```

use std::hash::Hasher as _;
use std::io::{self, Read};

use serde::{Deserialize, Serialize};
use twox_hash::XxHash64;

use super::hasher::READ_BUFFER_SIZE;

/// Default shingle width in bytes.
pub const DEFAULT_SHINGLE_SIZE: usize = 4;

/// Default number of hash permutations (signature length).
pub const DEFAULT_SIGNATURE_SIZE: usize = 128;

/// Mersenne prime 2^61 - 1 used as the permutation modulus.
const MERSENNE_61: u64 = (1 << 61) - 1;

/// Seed for the per-shingle base hash.
const SHINGLE_SEED: u64 = 0x5348_494e_474c_4531;

/// Seed for deriving permutation coefficients.
const PERMUTATION_SEED: u64 = 0x4d49_4e48_4153_4821;

/// Shingling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShingleConfig {
    /// Shingle width `k` in bytes.
    pub shingle_size: usize,
    /// Number of hash permutations `N`.
    pub signature_size: usize,
}

impl Default for ShingleConfig {
    fn default() -> Self {
        Self {
            shingle_size: DEFAULT_SHINGLE_SIZE,
            signature_size: DEFAULT_SIGNATURE_SIZE,
        }
    }
}

impl ShingleConfig {
    /// Create a configuration, clamping both values to at least 1.
    #[must_use]
    pub fn new(shingle_size: usize, signature_size: usize) -> Self {
        Self {
            shingle_size: shingle_size.max(1),
            signature_size: signature_size.max(1),
        }
    }
}

/// Fixed-length MinHash signature of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimilaritySignature {
    values: Vec<u64>,
    no_data: bool,
}

impl SimilaritySignature {
    /// The signature of empty content.
    ///
    /// It never matches any other signature, including another empty one.
    #[must_use]
    pub fn no_data(signature_size: usize) -> Self {
        Self {
            values: vec![u64::MAX; signature_size],
            no_data: true,
        }
    }

    /// Build a signature from precomputed minima.
    #[must_use]
    pub fn from_values(values: Vec<u64>) -> Self {
        Self {
            values,
            no_data: false,
        }
    }

    /// Whether this signature was computed over empty content.
    #[must_use]
    pub fn is_no_data(&self) -> bool {
        self.no_data
    }

    /// Signature length `N`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the signature has no positions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Minimum hash per permutation.
    #[must_use]
    pub fn values(&self) -> &[u64] {
        &self.values
    }

    /// Estimated Jaccard similarity: equal positions divided by `N`.
    ///
    /// Signatures of different lengths, and any no-data signature, score 0.0.
    #[must_use]
    pub fn similarity(&self, other: &Self) -> f64 {
        if self.no_data || other.no_data || self.values.len() != other.values.len() {
            return 0.0;
        }
        if self.values.is_empty() {
            return 0.0;
        }
        let matching = self
            .values
            .iter()
            .zip(&other.values)
            .filter(|(a, b)| a == b)
            .count();
        matching as f64 / self.values.len() as f64
    }
}

/// Builds [`SimilaritySignature`]s with a fixed permutation set.
#[derive(Debug, Clone)]
pub struct MinHasher {
    config: ShingleConfig,
    /// `(a, b)` of `h(x) = (a * x + b) mod p` per permutation.
    coefficients: Vec<(u64, u64)>,
}

impl MinHasher {
    /// Create a MinHasher for the given parameters.
    #[must_use]
    pub fn new(config: ShingleConfig) -> Self {
        let config = ShingleConfig::new(config.shingle_size, config.signature_size);
        let mut state = PERMUTATION_SEED;
        let coefficients = (0..config.signature_size)
            .map(|_| {
                let a = splitmix64(&mut state) % (MERSENNE_61 - 1) + 1;
                let b = splitmix64(&mut state) % MERSENNE_61;
                (a, b)
            })
            .collect();
        Self {
            config,
            coefficients,
        }
    }

    /// Shingling parameters in use.
    #[must_use]
    pub fn config(&self) -> ShingleConfig {
        self.config
    }

    /// Start an incremental signature computation.
    #[must_use]
    pub fn builder(&self) -> SignatureBuilder<'_> {
        SignatureBuilder {
            minhasher: self,
            minima: vec![u64::MAX; self.coefficients.len()],
            tail: Vec::with_capacity(self.config.shingle_size),
            total_len: 0,
            shingles: 0,
            last_base: None,
        }
    }

    /// Signature of an in-memory byte slice.
    #[must_use]
    pub fn signature(&self, bytes: &[u8]) -> SimilaritySignature {
        let mut builder = self.builder();
        builder.update(bytes);
        builder.finish()
    }

    /// Signature of a sequential stream read until EOF.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if reading fails.
    pub fn signature_reader<R: Read + ?Sized>(
        &self,
        reader: &mut R,
    ) -> io::Result<SimilaritySignature> {
        let mut builder = self.builder();
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
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

    fn absorb(&self, minima: &mut [u64], base: u64) {
        let x = u128::from(base % MERSENNE_61);
        let p = u128::from(MERSENNE_61);
        for (slot, &(a, b)) in minima.iter_mut().zip(&self.coefficients) {
            let h = ((u128::from(a) * x + u128::from(b)) % p) as u64;
            if h < *slot {
                *slot = h;
            }
        }
    }
}

/// Incremental signature computation over a byte stream.
///
/// Shingles spanning two `update` calls are handled by carrying the last
/// `k - 1` bytes forward.
pub struct SignatureBuilder<'a> {
    minhasher: &'a MinHasher,
    minima: Vec<u64>,
    tail: Vec<u8>,
    total_len: u64,
    shingles: u64,
    last_base: Option<u64>,
}

impl SignatureBuilder<'_> {
    /// Feed the next chunk of content.
    pub fn update(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.total_len += chunk.len() as u64;
        let k = self.minhasher.config.shingle_size;

        // Windows that start in the carried tail and end in this chunk.
        if !self.tail.is_empty() {
            let head = &chunk[..chunk.len().min(k - 1)];
            let mut joined = Vec::with_capacity(self.tail.len() + head.len());
            joined.extend_from_slice(&self.tail);
            joined.extend_from_slice(head);
            for window in joined.windows(k) {
                self.add_shingle(window);
            }
        }

        for window in chunk.windows(k) {
            self.add_shingle(window);
        }

        let keep = k - 1;
        if chunk.len() >= keep {
            self.tail.clear();
            self.tail.extend_from_slice(&chunk[chunk.len() - keep..]);
        } else {
            self.tail.extend_from_slice(chunk);
            let excess = self.tail.len().saturating_sub(keep);
            self.tail.drain(..excess);
        }
    }

    /// Finish and return the signature.
    ///
    /// Content shorter than `k` bytes is treated as a single shingle; empty
    /// content yields a no-data signature.
    #[must_use]
    pub fn finish(mut self) -> SimilaritySignature {
        if self.total_len == 0 {
            return SimilaritySignature::no_data(self.minima.len());
        }
        if self.shingles == 0 {
            let whole = std::mem::take(&mut self.tail);
            self.add_shingle(&whole);
        }
        SimilaritySignature::from_values(self.minima)
    }

    fn add_shingle(&mut self, window: &[u8]) {
        let mut hasher = XxHash64::with_seed(SHINGLE_SEED);
        hasher.write(window);
        let base = hasher.finish();
        self.shingles += 1;
        if self.last_base == Some(base) {
            return;
        }
        self.last_base = Some(base);
        self.minhasher.absorb(&mut self.minima, base);
    }
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
