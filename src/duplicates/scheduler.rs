//! Parallel per-file artifact computation.
//!
//! # Overview
//!
//! The scheduler owns two rayon thread pools: a hashing pool and a smaller
//! signature pool, since shingling costs more CPU per byte than BLAKE3.
//! Files are processed in chunks sized to the pool (twice the thread count)
//! so that only a bounded number of readers are open at a time. Between
//! chunks the scheduler polls cancellation and reports progress.
//!
//! When a run needs both digests and signatures, every file is read exactly
//! once and both artifacts are built from the same stream.
//!
//! Results are stored by input position, so the output does not depend on
//! worker completion order.

use std::io::{self, Read};
use std::num::NonZeroUsize;

use rayon::prelude::*;

use super::finder::DetectError;
use crate::progress::{Phase, RunContext};
use crate::scanner::{
    ContentDigest, ContentSource, FileRecord, Hasher, MinHasher, ReadError, ShingleConfig,
    SimilaritySignature,
};

/// Files per chunk, as a multiple of the pool's thread count.
const CHUNK_FACTOR: usize = 2;

/// Default hashing pool size: three quarters of the available parallelism.
#[must_use]
pub fn default_hash_threads() -> usize {
    (available_cores() * 3 / 4).max(1)
}

/// Default signature pool size: half of the available parallelism.
#[must_use]
pub fn default_signature_threads() -> usize {
    (available_cores() / 2).max(1)
}

fn available_cores() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// Which per-file artifacts a run needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArtifactNeeds {
    /// Content digests
    pub digest: bool,
    /// Similarity signatures
    pub signature: bool,
}

impl ArtifactNeeds {
    /// Nothing is read.
    pub const NONE: Self = Self {
        digest: false,
        signature: false,
    };

    /// Whether any file content must be read.
    #[must_use]
    pub fn any(self) -> bool {
        self.digest || self.signature
    }

    /// Progress phase used for these needs.
    #[must_use]
    pub fn phase(self) -> Option<Phase> {
        match (self.digest, self.signature) {
            (true, true) => Some(Phase::Artifacts),
            (true, false) => Some(Phase::Hashing),
            (false, true) => Some(Phase::Signatures),
            (false, false) => None,
        }
    }
}

/// Per-file artifacts, indexed by input position.
///
/// A file that could not be read has `None` in both vectors and an entry in
/// `failures`.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSet {
    /// Digest per input file, if requested and readable
    pub digests: Vec<Option<ContentDigest>>,
    /// Signature per input file, if requested and readable
    pub signatures: Vec<Option<SimilaritySignature>>,
    /// Files whose content could not be read, in input order
    pub failures: Vec<ReadError>,
}

impl ArtifactSet {
    fn empty(len: usize) -> Self {
        Self {
            digests: vec![None; len],
            signatures: vec![None; len],
            failures: Vec::new(),
        }
    }

    /// `(file, digest)` pairs of readable files, in input order.
    pub fn digest_pairs<'a>(
        &'a self,
        files: &'a [FileRecord],
    ) -> impl Iterator<Item = (&'a FileRecord, ContentDigest)> + 'a {
        files
            .iter()
            .zip(&self.digests)
            .filter_map(|(f, d)| d.map(|d| (f, d)))
    }

    /// `(file, signature)` pairs of readable files, in input order.
    #[must_use]
    pub fn signature_pairs<'a>(
        &'a self,
        files: &'a [FileRecord],
    ) -> Vec<(&'a FileRecord, &'a SimilaritySignature)> {
        files
            .iter()
            .zip(&self.signatures)
            .filter_map(|(f, s)| s.as_ref().map(|s| (f, s)))
            .collect()
    }
}

type FileArtifacts = (Option<ContentDigest>, Option<SimilaritySignature>);

/// Computes digests and signatures on bounded worker pools.
pub struct ArtifactScheduler {
    hash_pool: rayon::ThreadPool,
    signature_pool: rayon::ThreadPool,
    hasher: Hasher,
    minhasher: MinHasher,
}

impl std::fmt::Debug for ArtifactScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactScheduler")
            .field("hash_threads", &self.hash_pool.current_num_threads())
            .field("signature_threads", &self.signature_pool.current_num_threads())
            .field("shingle", &self.minhasher.config())
            .finish()
    }
}

impl ArtifactScheduler {
    /// Build both pools. A thread count of 0 selects the default size.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::Internal`] if a pool cannot be created.
    pub fn new(
        hash_threads: usize,
        signature_threads: usize,
        shingle: ShingleConfig,
    ) -> Result<Self, DetectError> {
        let hash_threads = if hash_threads == 0 {
            default_hash_threads()
        } else {
            hash_threads
        };
        let signature_threads = if signature_threads == 0 {
            default_signature_threads()
        } else {
            signature_threads
        };

        let hash_pool = build_pool("dupesieve-hash", hash_threads)?;
        let signature_pool = build_pool("dupesieve-sig", signature_threads)?;
        log::debug!(
            "Artifact pools ready: {} hashing threads, {} signature threads",
            hash_threads,
            signature_threads
        );

        Ok(Self {
            hash_pool,
            signature_pool,
            hasher: Hasher::new(),
            minhasher: MinHasher::new(shingle),
        })
    }

    /// Threads in the hashing pool.
    #[must_use]
    pub fn hash_threads(&self) -> usize {
        self.hash_pool.current_num_threads()
    }

    /// Threads in the signature pool.
    #[must_use]
    pub fn signature_threads(&self) -> usize {
        self.signature_pool.current_num_threads()
    }

    /// Shingling parameters used for signatures.
    #[must_use]
    pub fn shingle_config(&self) -> ShingleConfig {
        self.minhasher.config()
    }

    /// Compute the requested artifacts for every file.
    ///
    /// Unreadable files are recorded in [`ArtifactSet::failures`] and do not
    /// stop the run.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::Cancelled`] if `ctx` observes cancellation
    /// between chunks.
    pub fn compute(
        &self,
        files: &[FileRecord],
        source: &dyn ContentSource,
        needs: ArtifactNeeds,
        ctx: &RunContext,
    ) -> Result<ArtifactSet, DetectError> {
        let mut set = ArtifactSet::empty(files.len());
        let Some(phase) = needs.phase() else {
            return Ok(set);
        };

        // Signature work (alone or combined) runs on the smaller pool.
        let pool = if needs.signature {
            &self.signature_pool
        } else {
            &self.hash_pool
        };
        let chunk_size = (pool.current_num_threads() * CHUNK_FACTOR).max(1);
        let total = files.len();

        log::info!(
            "Computing {} for {} files ({} threads)",
            phase,
            total,
            pool.current_num_threads()
        );
        ctx.phase_start(phase, total);

        let mut completed = 0usize;
        for (chunk_index, chunk) in files.chunks(chunk_size).enumerate() {
            ctx.check_cancelled()?;

            let results: Vec<Result<FileArtifacts, ReadError>> = pool.install(|| {
                chunk
                    .par_iter()
                    .map(|file| self.compute_one(file, source, needs))
                    .collect()
            });

            let offset = chunk_index * chunk_size;
            for (i, result) in results.into_iter().enumerate() {
                let file = &files[offset + i];
                match result {
                    Ok((digest, signature)) => {
                        log::trace!("Artifacts computed: {}", file.path.display());
                        set.digests[offset + i] = digest;
                        set.signatures[offset + i] = signature;
                    }
                    Err(e) => {
                        log::warn!("Failed to read {}: {}", file.path.display(), e);
                        set.failures.push(e);
                    }
                }
            }

            completed += chunk.len();
            ctx.report(
                completed,
                total,
                chunk.last().map(|f| f.name.as_str()),
            );
        }

        ctx.phase_end(phase);
        log::info!(
            "{} complete: {} readable, {} unreadable",
            phase,
            total - set.failures.len(),
            set.failures.len()
        );
        Ok(set)
    }

    /// Read `file` once, feeding every requested artifact builder.
    fn compute_one(
        &self,
        file: &FileRecord,
        source: &dyn ContentSource,
        needs: ArtifactNeeds,
    ) -> Result<FileArtifacts, ReadError> {
        let mut reader = source.open(file)?;
        let mut digest = needs.digest.then(|| self.hasher.builder());
        let mut signature = needs.signature.then(|| self.minhasher.builder());
        let mut buf = vec![0u8; self.hasher.buffer_size()];

        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ReadError::from_io(&file.path, e)),
            };
            if let Some(d) = digest.as_mut() {
                d.update(&buf[..n]);
            }
            if let Some(s) = signature.as_mut() {
                s.update(&buf[..n]);
            }
        }

        Ok((
            digest.map(|d| d.finish()),
            signature.map(|s| s.finish()),
        ))
    }
}

fn build_pool(prefix: &'static str, threads: usize) -> Result<rayon::ThreadPool, DetectError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(move |i| format!("{prefix}-{i}"))
        .build()
        .map_err(|e| DetectError::Internal(format!("failed to build {prefix} pool: {e}")))
}
