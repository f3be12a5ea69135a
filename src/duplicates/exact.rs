//! Exact-match grouping by content digest.
//!
//! Files are bucketed by [`ContentDigest`]; every bucket holding two or more
//! files becomes an [`exact`](super::GroupKind::Exact) group. Buckets keep the
//! input order of their files, and groups appear in the order their first
//! file appeared in the input.

use std::collections::HashMap;

use super::groups::{CriterionDetail, Group};
use crate::scanner::{ContentDigest, FileRecord};

/// Group files that share a digest.
///
/// # Example
///
/// ```
/// use dupesieve::duplicates::group_exact;
/// use dupesieve::scanner::{FileRecord, Hasher};
/// use std::time::SystemTime;
///
/// let hasher = Hasher::new();
/// let a = FileRecord::new("/a.txt", 3, SystemTime::UNIX_EPOCH);
/// let b = FileRecord::new("/b.txt", 3, SystemTime::UNIX_EPOCH);
/// let c = FileRecord::new("/c.txt", 3, SystemTime::UNIX_EPOCH);
///
/// let groups = group_exact([
///     (&a, hasher.digest(b"abc")),
///     (&b, hasher.digest(b"abc")),
///     (&c, hasher.digest(b"xyz")),
/// ]);
/// assert_eq!(groups.len(), 1);
/// assert_eq!(groups[0].len(), 2);
/// ```
pub fn group_exact<'a, I>(entries: I) -> Vec<Group>
where
    I: IntoIterator<Item = (&'a FileRecord, ContentDigest)>,
{
    let mut index: HashMap<ContentDigest, usize> = HashMap::new();
    let mut buckets: Vec<(ContentDigest, Vec<FileRecord>)> = Vec::new();

    for (file, digest) in entries {
        match index.get(&digest) {
            Some(&slot) => buckets[slot].1.push(file.clone()),
            None => {
                index.insert(digest, buckets.len());
                buckets.push((digest, vec![file.clone()]));
            }
        }
    }

    let groups: Vec<Group> = buckets
        .into_iter()
        .filter(|(_, files)| files.len() > 1)
        .map(|(digest, files)| {
            log::debug!("Exact group {:?}: {} files", digest, files.len());
            Group::single(files, CriterionDetail::Exact { digest })
        })
        .collect();

    groups
}
