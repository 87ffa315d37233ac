use std::net::SocketAddr;

use shardkv_client::{ClientError, ShardClient};
use shardkv_store::Key;

use crate::hashing::{BucketHasher, Md5Hasher};
use crate::partition::partition_point_for;

/// Failure validating a partition map. Grounded on spec.md §8 invariant 5
/// and §4.8's validation rules.
#[derive(Debug, thiserror::Error)]
pub enum BucketMapError {
    #[error("partition map is empty")]
    Empty,
    #[error("first bucket must start at 0.0, got {0}")]
    FirstBucketNotZero(f64),
    #[error("bucket starts must be strictly increasing: {0} is not less than {1}")]
    NotIncreasing(f64, f64),
    #[error("bucket start {0} is not less than 1.0")]
    StartNotBelowOne(f64),
    #[error("duplicate shard name {0:?}")]
    DuplicateName(String),
}

/// One entry in the partition map: the bucket's start and the client handle
/// connected to its owning shard.
pub struct BucketEntry {
    pub start: f64,
    pub name: Option<String>,
    pub addr: SocketAddr,
    pub client: ShardClient,
}

/// Validates bucket starts are contiguous, non-overlapping, cover `[0,1)`,
/// and start at `0.0` — spec.md §3 invariant 2 / §8 invariant 5.
pub fn validate_bucket_starts(starts: &[f64], names: &[Option<String>]) -> Result<(), BucketMapError> {
    let Some(&first) = starts.first() else {
        return Err(BucketMapError::Empty);
    };
    if first != 0.0 {
        return Err(BucketMapError::FirstBucketNotZero(first));
    }
    for window in starts.windows(2) {
        let (a, b) = (window[0], window[1]);
        if !(a < b) {
            return Err(BucketMapError::NotIncreasing(a, b));
        }
    }
    for &start in starts {
        if !(start < 1.0) {
            return Err(BucketMapError::StartNotBelowOne(start));
        }
    }
    let mut seen = std::collections::HashSet::new();
    for name in names.iter().flatten() {
        if !seen.insert(name) {
            return Err(BucketMapError::DuplicateName(name.clone()));
        }
    }
    Ok(())
}

/// The in-process routing table the bootstrap service serves queries from.
/// Grounded on `pyshard/master/master.py`'s `Master`/`Shards`. The source's
/// commented-out `split`/`insert`/`remove` bucket-rebalancing code is
/// deliberately not implemented here (spec.md §9 Open Questions: aspirational).
pub struct Master<H: BucketHasher = Md5Hasher> {
    entries: Vec<BucketEntry>,
    hasher: H,
}

impl Master<Md5Hasher> {
    pub fn new(entries: Vec<BucketEntry>) -> Result<Self, BucketMapError> {
        Self::with_hasher(entries, Md5Hasher)
    }
}

impl<H: BucketHasher> Master<H> {
    pub fn with_hasher(mut entries: Vec<BucketEntry>, hasher: H) -> Result<Self, BucketMapError> {
        entries.sort_by(|a, b| a.start.total_cmp(&b.start));
        let starts: Vec<f64> = entries.iter().map(|e| e.start).collect();
        let names: Vec<Option<String>> = entries.iter().map(|e| e.name.clone()).collect();
        validate_bucket_starts(&starts, &names)?;
        Ok(Master { entries, hasher })
    }

    pub fn bucket_starts(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.start).collect()
    }

    /// Returns `(hash, shard_client)` for `(index, key)`.
    pub fn get_shard(&self, index: &str, key: &Key) -> (f64, &ShardClient) {
        let hash = self.hasher.point(index, key);
        let starts = self.bucket_starts();
        let i = partition_point_for(&starts, hash);
        (hash, &self.entries[i].client)
    }

    /// Returns `{bucket_start -> addr}` for every shard, in bucket order.
    pub fn get_map(&self) -> Vec<(f64, SocketAddr)> {
        self.entries.iter().map(|e| (e.start, e.addr)).collect()
    }

    pub async fn create_index(&self, index: &str) -> Result<(), ClientError> {
        for entry in &self.entries {
            entry.client.create_index(index).await?;
        }
        Ok(())
    }

    pub async fn drop_index(&self, index: &str) -> Result<(), ClientError> {
        for entry in &self.entries {
            entry.client.drop_index(index).await?;
        }
        Ok(())
    }

    pub fn entries(&self) -> &[BucketEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_a_first_bucket_not_at_zero() {
        let err = validate_bucket_starts(&[0.1, 0.5], &[None, None]).unwrap_err();
        assert!(matches!(err, BucketMapError::FirstBucketNotZero(_)));
    }

    #[test]
    fn rejects_non_increasing_starts() {
        let err = validate_bucket_starts(&[0.0, 0.5, 0.4], &[None, None, None]).unwrap_err();
        assert!(matches!(err, BucketMapError::NotIncreasing(_, _)));
    }

    #[test]
    fn rejects_duplicate_names() {
        let names = vec![Some("a".to_string()), Some("a".to_string())];
        let err = validate_bucket_starts(&[0.0, 0.5], &names).unwrap_err();
        assert!(matches!(err, BucketMapError::DuplicateName(_)));
    }

    #[test]
    fn accepts_a_valid_contiguous_map() {
        assert!(validate_bucket_starts(&[0.0, 0.5], &[None, None]).is_ok());
    }
}
