use std::collections::BTreeMap;

use serde_json::Value;
use shardkv_store::{Key, Record, Store, StoreError};

use crate::hash::OrderedHash;
use crate::size::estimated_size;

/// Failure performing a shard-engine operation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("out of memory: writing {attempted} bytes would exceed max_size {max_size} (current size {current})")]
    OutOfMemory {
        attempted: u64,
        current: u64,
        max_size: u64,
    },
    #[error("cannot lower max_size below the current size {current}")]
    MaxSizeBelowCurrent { current: u64, requested: u64 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The remote half of a relocation: a handle able to `pop` a key from a
/// peer shard. Implemented by `shardkv-client::ShardClient` in the binary
/// crates that wire an engine to a live network pipe; kept as a trait here
/// so this crate never depends on the transport/client stack.
#[async_trait::async_trait]
pub trait RelocPipe {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn pop(&self, index: &str, key: &Key) -> Result<Option<Record>, Self::Error>;
}

/// Observability snapshot returned by `get_stat`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ShardStat {
    pub start: f64,
    pub end: f64,
    pub empty: bool,
    pub max_size: u64,
    pub free_mem: u64,
    pub distribution: BTreeMap<String, u64>,
}

/// Owns a [`Store`], a hash-range `[start, end)`, a byte budget, and a
/// sub-bucket distribution histogram. Grounded on the source's `Shard`
/// class, restructured as an explicit façade: unlike the source's
/// `__getattr__` forwarding to `self.storage`, every operation this crate
/// exposes is listed here and nowhere else.
pub struct ShardEngine {
    store: Store,
    start: f64,
    end: f64,
    bins_num: u32,
    size: u64,
    max_size: u64,
    distr: BTreeMap<OrderedHash, u64>,
    name: Option<String>,
}

impl ShardEngine {
    pub fn new(start: f64, end: f64, max_size: u64, bins_num: u32) -> Self {
        ShardEngine {
            store: Store::new(),
            start,
            end,
            bins_num,
            size: 0,
            max_size,
            distr: BTreeMap::new(),
            name: None,
        }
    }

    pub fn with_store(store: Store, start: f64, end: f64, max_size: u64, bins_num: u32) -> Self {
        ShardEngine {
            store,
            start,
            end,
            bins_num,
            size: 0,
            max_size,
            distr: BTreeMap::new(),
            name: None,
        }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn bin_step(&self) -> f64 {
        (self.end - self.start) / self.bins_num as f64
    }

    fn bucket_for(&self, hash: f64) -> f64 {
        bucket_for(hash, self.start, self.bin_step())
    }

    pub fn create_index(&mut self, index: &str) -> Result<(), EngineError> {
        self.store.create_index(index).map_err(Into::into)
    }

    pub fn drop_index(&mut self, index: &str) -> Result<(), EngineError> {
        self.store.drop_index(index).map_err(Into::into)
    }

    pub fn keys(&self, index: &str) -> Result<Vec<Key>, EngineError> {
        self.store.keys(index).map_err(Into::into)
    }

    pub fn read(&self, index: &str, key: &Key) -> Result<Option<Record>, EngineError> {
        self.store.read(index, key).map_err(Into::into)
    }

    /// Returns the number of bytes written, or `0` if `key` already existed
    /// within `index` (no overwrite, matching the source's `write`).
    pub fn write(
        &mut self,
        index: &str,
        key: Key,
        hash: f64,
        payload: Value,
    ) -> Result<u64, EngineError> {
        let item_size = estimated_size(&payload);
        if self.size + item_size > self.max_size {
            return Err(EngineError::OutOfMemory {
                attempted: item_size,
                current: self.size,
                max_size: self.max_size,
            });
        }

        let wrote = self
            .store
            .write(index, key, Record { hash, payload })?;
        if !wrote {
            return Ok(0);
        }

        self.size += item_size;
        *self.distr.entry(OrderedHash(self.bucket_for(hash))).or_insert(0) += 1;
        Ok(item_size)
    }

    pub fn pop(&mut self, index: &str, key: &Key) -> Result<Option<Record>, EngineError> {
        let Some(record) = self.store.pop(index, key)? else {
            return Ok(None);
        };
        self.release(&record);
        Ok(Some(record))
    }

    /// Like [`ShardEngine::pop`] but returns only the freed byte count.
    pub fn remove(&mut self, index: &str, key: &Key) -> Result<u64, EngineError> {
        let Some(record) = self.store.remove(index, key)? else {
            return Ok(0);
        };
        let freed = estimated_size(&record.payload);
        self.release(&record);
        Ok(freed)
    }

    fn release(&mut self, record: &Record) {
        let item_size = estimated_size(&record.payload);
        self.size = self.size.saturating_sub(item_size);
        let bucket = OrderedHash(self.bucket_for(record.hash));
        if let Some(count) = self.distr.get_mut(&bucket) {
            *count = count.saturating_sub(1);
        }
    }

    /// Pulls `key` from `pipe` (a peer shard) and writes it locally.
    /// Returns the number of bytes written, or `0` if the peer didn't have
    /// the key. This is the only operation that transfers record ownership
    /// between shards.
    pub async fn reloc<P: RelocPipe>(
        &mut self,
        index: &str,
        key: Key,
        pipe: &P,
    ) -> Result<u64, RelocError<P::Error>> {
        let Some(record) = pipe.pop(index, &key).await.map_err(RelocError::Pipe)? else {
            return Ok(0);
        };
        self.write(index, key, record.hash, record.payload)
            .map_err(RelocError::Engine)
    }

    /// Recomputes the distribution histogram from scratch over all stored
    /// records. Must be invoked after `set_start`/`set_end`.
    pub fn update_distr(&mut self) {
        self.distr.clear();
        for record in self.store.values_all() {
            let bucket = OrderedHash(self.bucket_for(record.hash));
            *self.distr.entry(bucket).or_insert(0) += 1;
        }
    }

    pub fn set_start(&mut self, value: f64) {
        self.start = value;
    }

    pub fn set_end(&mut self, value: f64) {
        self.end = value;
    }

    pub fn set_maxsize(&mut self, value: u64) -> Result<(), EngineError> {
        if value < self.size {
            return Err(EngineError::MaxSizeBelowCurrent {
                current: self.size,
                requested: value,
            });
        }
        self.max_size = value;
        Ok(())
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    pub fn get_stat(&self) -> ShardStat {
        ShardStat {
            start: self.start,
            end: self.end,
            empty: self.size == 0,
            max_size: self.max_size,
            free_mem: self.max_size.saturating_sub(self.size),
            distribution: self
                .distr
                .iter()
                .map(|(bucket, count)| (format!("{:.10}", bucket.0), *count))
                .collect(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }
}

/// Given the start of a range and its sub-bucket step, maps `hash` to the
/// start of the sub-bucket it falls in: `start + floor((h-start)/step)*step`.
pub fn bucket_for(hash: f64, start: f64, step: f64) -> f64 {
    let steps = ((hash - start) / step).floor();
    start + step * steps
}

#[derive(Debug, thiserror::Error)]
pub enum RelocError<E: std::error::Error + 'static> {
    #[error("relocation pipe failed: {0}")]
    Pipe(E),
    #[error(transparent)]
    Engine(EngineError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine() -> ShardEngine {
        let mut e = ShardEngine::new(0.0, 1.0, 1024, 5);
        e.create_index("t").unwrap();
        e
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut e = engine();
        let written = e
            .write("t", Key::Str("k1".into()), 0.25, json!("v1"))
            .unwrap();
        assert!(written > 0);
        let got = e.read("t", &Key::Str("k1".into())).unwrap().unwrap();
        assert_eq!(got.payload, json!("v1"));
        assert_eq!(got.hash, 0.25);
    }

    #[test]
    fn duplicate_write_returns_zero_and_keeps_original() {
        let mut e = engine();
        e.write("t", Key::Str("k1".into()), 0.25, json!("v1")).unwrap();
        let second = e
            .write("t", Key::Str("k1".into()), 0.25, json!("v2"))
            .unwrap();
        assert_eq!(second, 0);
        assert_eq!(
            e.read("t", &Key::Str("k1".into())).unwrap().unwrap().payload,
            json!("v1")
        );
    }

    #[test]
    fn pop_clears_size_and_histogram() {
        let mut e = engine();
        e.write("t", Key::Str("k1".into()), 0.25, json!("v1")).unwrap();
        assert!(e.size() > 0);
        let popped = e.pop("t", &Key::Str("k1".into())).unwrap();
        assert!(popped.is_some());
        assert_eq!(e.size(), 0);
        assert!(e.get_stat().distribution.values().all(|&n| n == 0));
    }

    #[test]
    fn out_of_memory_is_rejected() {
        let mut e = ShardEngine::new(0.0, 1.0, 1, 5);
        e.create_index("t").unwrap();
        let err = e
            .write("t", Key::Str("k1".into()), 0.25, json!("this is way too big"))
            .unwrap_err();
        assert!(matches!(err, EngineError::OutOfMemory { .. }));
    }

    #[test]
    fn set_maxsize_rejects_below_current_size() {
        let mut e = engine();
        e.write("t", Key::Str("k1".into()), 0.25, json!("hello")).unwrap();
        let err = e.set_maxsize(1).unwrap_err();
        assert!(matches!(err, EngineError::MaxSizeBelowCurrent { .. }));
    }

    #[test]
    fn update_distr_matches_incremental_tracking() {
        let mut e = engine();
        for (k, h) in [("k1", 0.05), ("k2", 0.35), ("k3", 0.75)] {
            e.write("t", Key::Str(k.into()), h, json!(k)).unwrap();
        }
        let before = e.get_stat().distribution;
        e.update_distr();
        let after = e.get_stat().distribution;
        assert_eq!(before, after);
    }

    #[test]
    fn bucket_for_matches_spec_formula() {
        // start=0, end=1, bins=5 -> step=0.2
        assert_eq!(bucket_for(0.0, 0.0, 0.2), 0.0);
        assert_eq!(bucket_for(0.05, 0.0, 0.2), 0.0);
        assert_eq!(bucket_for(0.25, 0.0, 0.2), 0.2);
        assert_eq!(bucket_for(0.99, 0.0, 0.2), 0.8);
    }
}
