use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::key::Key;

/// Failure performing an operation against the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("index {0:?} already exists")]
    IndexExists(String),
    #[error("index {0:?} not found")]
    IndexNotFound(String),
    #[error("failed to read snapshot at {path:?}: {source}")]
    SnapshotRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write snapshot at {path:?}: {source}")]
    SnapshotWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot at {path:?} is not valid JSON: {source}")]
    SnapshotDecode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// `{hash, payload}` — exactly the source's `{'hash_': ..., 'record': ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub hash: f64,
    pub payload: Value,
}

type Index = BTreeMap<Key, Record>;

/// A named collection of independent key -> [`Record`] maps.
///
/// `BTreeMap` is used (rather than a `HashMap`) so a dumped snapshot has a
/// deterministic byte layout across runs; the source's Python dict preserves
/// insertion order incidentally, which this does not try to reproduce.
pub struct Store {
    indexes: BTreeMap<String, Index>,
    snapshot_path: Option<PathBuf>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Store {
            indexes: BTreeMap::new(),
            snapshot_path: None,
        }
    }

    pub fn with_snapshot_path(path: PathBuf) -> Self {
        Store {
            indexes: BTreeMap::new(),
            snapshot_path: Some(path),
        }
    }

    pub fn create_index(&mut self, index: &str) -> Result<(), StoreError> {
        if self.indexes.contains_key(index) {
            return Err(StoreError::IndexExists(index.to_string()));
        }
        self.indexes.insert(index.to_string(), BTreeMap::new());
        Ok(())
    }

    pub fn drop_index(&mut self, index: &str) -> Result<(), StoreError> {
        self.indexes
            .remove(index)
            .map(|_| ())
            .ok_or_else(|| StoreError::IndexNotFound(index.to_string()))
    }

    pub fn has(&self, index: &str, key: &Key) -> Result<bool, StoreError> {
        Ok(self.get_index(index)?.contains_key(key))
    }

    pub fn read(&self, index: &str, key: &Key) -> Result<Option<Record>, StoreError> {
        Ok(self.get_index(index)?.get(key).cloned())
    }

    /// Inserts `record` under `key`. Returns `false` if `key` already
    /// existed (no overwrite), `true` on a fresh insert.
    pub fn write(&mut self, index: &str, key: Key, record: Record) -> Result<bool, StoreError> {
        let collection = self.get_index_mut(index)?;
        if collection.contains_key(&key) {
            return Ok(false);
        }
        collection.insert(key, record);
        Ok(true)
    }

    pub fn pop(&mut self, index: &str, key: &Key) -> Result<Option<Record>, StoreError> {
        Ok(self.get_index_mut(index)?.remove(key))
    }

    pub fn remove(&mut self, index: &str, key: &Key) -> Result<Option<Record>, StoreError> {
        Ok(self.get_index_mut(index)?.remove(key))
    }

    pub fn keys(&self, index: &str) -> Result<Vec<Key>, StoreError> {
        Ok(self.get_index(index)?.keys().cloned().collect())
    }

    pub fn values(&self, index: &str) -> Result<Vec<Record>, StoreError> {
        Ok(self.get_index(index)?.values().cloned().collect())
    }

    pub fn values_all(&self) -> Vec<Record> {
        self.indexes
            .values()
            .flat_map(|idx| idx.values().cloned())
            .collect()
    }

    pub fn indexes(&self) -> impl Iterator<Item = &str> {
        self.indexes.keys().map(String::as_str)
    }

    fn get_index(&self, index: &str) -> Result<&Index, StoreError> {
        self.indexes
            .get(index)
            .ok_or_else(|| StoreError::IndexNotFound(index.to_string()))
    }

    fn get_index_mut(&mut self, index: &str) -> Result<&mut Index, StoreError> {
        self.indexes
            .get_mut(index)
            .ok_or_else(|| StoreError::IndexNotFound(index.to_string()))
    }

    /// Loads the snapshot file if configured and present, replacing all
    /// current state atomically (whole-file read).
    pub fn start(&mut self) -> Result<(), StoreError> {
        let Some(path) = self.snapshot_path.clone() else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }
        let data = fs::read_to_string(&path).map_err(|source| StoreError::SnapshotRead {
            path: path.clone(),
            source,
        })?;
        // Keys round-trip through `(Key, Record)` pairs, not a JSON object:
        // `serde_json` map keys must be strings, and a `Float` key has no
        // lossless string round trip without also carrying its own variant
        // tag, which a plain object key can't do.
        let loaded: BTreeMap<String, Vec<(Key, Record)>> =
            serde_json::from_str(&data).map_err(|source| StoreError::SnapshotDecode {
                path: path.clone(),
                source,
            })?;
        self.indexes = loaded
            .into_iter()
            .map(|(index, pairs)| (index, pairs.into_iter().collect()))
            .collect();
        Ok(())
    }

    /// Dumps the whole store to the snapshot file, if configured.
    pub fn stop(&self) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let dump: BTreeMap<&str, Vec<(&Key, &Record)>> = self
            .indexes
            .iter()
            .map(|(index, records)| (index.as_str(), records.iter().collect()))
            .collect();
        let data = serde_json::to_string(&dump).expect("snapshot always serializes");
        fs::write(path, data).map_err(|source| StoreError::SnapshotWrite {
            path: path.clone(),
            source,
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(payload: Value) -> Record {
        Record {
            hash: 0.1,
            payload,
        }
    }

    #[test]
    fn create_index_rejects_duplicates() {
        let mut store = Store::new();
        store.create_index("t").unwrap();
        assert!(matches!(
            store.create_index("t"),
            Err(StoreError::IndexExists(_))
        ));
    }

    #[test]
    fn operations_on_missing_index_fail() {
        let store = Store::new();
        assert!(matches!(
            store.read("missing", &Key::Str("k".into())),
            Err(StoreError::IndexNotFound(_))
        ));
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut store = Store::new();
        store.create_index("t").unwrap();
        let key = Key::Str("k1".to_string());
        assert!(store
            .write("t", key.clone(), rec(json!("v1")))
            .unwrap());
        let got = store.read("t", &key).unwrap().unwrap();
        assert_eq!(got.payload, json!("v1"));
    }

    #[test]
    fn duplicate_write_does_not_overwrite() {
        let mut store = Store::new();
        store.create_index("t").unwrap();
        let key = Key::Str("k1".to_string());
        assert!(store.write("t", key.clone(), rec(json!("v1"))).unwrap());
        assert!(!store.write("t", key.clone(), rec(json!("v2"))).unwrap());
        assert_eq!(store.read("t", &key).unwrap().unwrap().payload, json!("v1"));
    }

    #[test]
    fn pop_removes_and_returns() {
        let mut store = Store::new();
        store.create_index("t").unwrap();
        let key = Key::Str("k1".to_string());
        store.write("t", key.clone(), rec(json!("v1"))).unwrap();
        let popped = store.pop("t", &key).unwrap();
        assert_eq!(popped.unwrap().payload, json!("v1"));
        assert!(store.read("t", &key).unwrap().is_none());
    }

    #[test]
    fn snapshot_round_trips_through_a_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        let mut store = Store::with_snapshot_path(path.clone());
        store.start().unwrap();
        store.create_index("t").unwrap();
        store
            .write("t", Key::Str("k1".into()), rec(json!("v1")))
            .unwrap();
        store.stop().unwrap();

        let mut reloaded = Store::with_snapshot_path(path);
        reloaded.start().unwrap();
        let got = reloaded.read("t", &Key::Str("k1".into())).unwrap().unwrap();
        assert_eq!(got.payload, json!("v1"));
    }
}
