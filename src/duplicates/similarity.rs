//! Content-similarity clustering over MinHash signatures.
//!
//! Every pair of signatures is compared; pairs at or above the threshold are
//! edges of an undirected graph, and each connected component with two or
//! more files becomes a [`similarity`](super::GroupKind::Similarity) group.
//!
//! The pairwise step is quadratic in the number of files. Callers with very
//! large batches should pre-bucket (for example by size range) and cluster
//! each bucket separately.

use super::finder::DetectError;
use super::groups::{CriterionDetail, Group};
use crate::progress::{Phase, RunContext};
use crate::scanner::{FileRecord, SimilaritySignature};

/// Disjoint-set forest with path halving and union by size.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    /// `n` singleton sets.
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    /// Representative of the set containing `x`.
    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Merge the sets of `a` and `b`. Returns false if already joined.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
        true
    }
}

/// Cluster files whose signatures are at least `threshold` similar.
///
/// Files within a group keep input order; groups are ordered by their first
/// member's input position. `avg_similarity` is the mean over every pair in
/// the component, including pairs that are only connected transitively.
///
/// # Errors
///
/// Returns [`DetectError::Cancelled`] if `ctx` observes cancellation before
/// a comparison row.
///
/// # Example
///
/// ```
/// use dupesieve::duplicates::cluster_by_similarity;
/// use dupesieve::progress::RunContext;
/// use dupesieve::scanner::{FileRecord, MinHasher, ShingleConfig};
/// use std::time::SystemTime;
///
/// let minhasher = MinHasher::new(ShingleConfig::default());
/// let a = FileRecord::new("/a.txt", 10, SystemTime::UNIX_EPOCH);
/// let b = FileRecord::new("/b.txt", 10, SystemTime::UNIX_EPOCH);
/// let sa = minhasher.signature(b"the quick brown fox jumps");
/// let sb = minhasher.signature(b"the quick brown fox jumps");
///
/// let groups = cluster_by_similarity(&[(&a, &sa), (&b, &sb)], 1.0, &RunContext::detached()).unwrap();
/// assert_eq!(groups.len(), 1);
/// ```
pub fn cluster_by_similarity(
    entries: &[(&FileRecord, &SimilaritySignature)],
    threshold: f64,
    ctx: &RunContext,
) -> Result<Vec<Group>, DetectError> {
    let n = entries.len();
    let total = n * n.saturating_sub(1) / 2;
    ctx.phase_start(Phase::SimilarityGrouping, total);

    let mut sets = UnionFind::new(n);
    let mut completed = 0usize;
    let mut edges = 0usize;

    for i in 0..n {
        ctx.check_cancelled()?;

        let (file_i, sig_i) = entries[i];
        for (offset, &(_, sig_j)) in entries[i + 1..].iter().enumerate() {
            if sig_i.similarity(sig_j) >= threshold {
                edges += 1;
                sets.union(i, i + 1 + offset);
            }
        }

        completed += n - 1 - i;
        ctx.report(completed, total, Some(&file_i.name));
    }

    // Components keyed by representative, ordered by smallest member.
    let mut slot_of_root: Vec<Option<usize>> = vec![None; n];
    let mut components: Vec<Vec<usize>> = Vec::new();
    for i in 0..n {
        let root = sets.find(i);
        match slot_of_root[root] {
            Some(slot) => components[slot].push(i),
            None => {
                slot_of_root[root] = Some(components.len());
                components.push(vec![i]);
            }
        }
    }

    let groups: Vec<Group> = components
        .into_iter()
        .filter(|members| members.len() > 1)
        .map(|members| build_group(entries, &members))
        .collect();

    ctx.phase_end(Phase::SimilarityGrouping);
    log::info!(
        "Similarity clustering (threshold {:.2}): {} groups from {} files ({} edges)",
        threshold,
        groups.len(),
        n,
        edges
    );
    Ok(groups)
}

fn build_group(entries: &[(&FileRecord, &SimilaritySignature)], members: &[usize]) -> Group {
    let mut sum = 0.0;
    let mut pairs = 0usize;
    for (pos, &a) in members.iter().enumerate() {
        for &b in &members[pos + 1..] {
            sum += entries[a].1.similarity(entries[b].1);
            pairs += 1;
        }
    }
    let avg_similarity = if pairs == 0 { 0.0 } else { sum / pairs as f64 };

    log::debug!(
        "Similarity group: {} files, avg similarity {:.3}",
        members.len(),
        avg_similarity
    );

    Group::single(
        members.iter().map(|&m| entries[m].0.clone()).collect(),
        CriterionDetail::Similarity { avg_similarity },
    )
}
