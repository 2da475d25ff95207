//! File-backed store adapter.
//!
//! One JSON file per collection under a directory held under an exclusive
//! `flock`, so two node processes cannot share a data directory. The engine
//! is the in-memory table set with write-through persistence; collections
//! here are small enough (metadata, not chunk payloads) that whole-file
//! rewrites are acceptable.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use fs2::FileExt;
use serde_json::Value;
use tracing::debug;

use crate::error::StoreError;
use crate::filter::{Filter, FindOptions};
use crate::memory::Tables;
use crate::ports::{DocumentStore, GroupStats, IndexSpec};

/// Document store persisted as `<dir>/<collection>.json`.
pub struct FileDocumentStore {
    dir: PathBuf,
    inner: RwLock<Tables>,
    // Held for the lifetime of the store; unlocked on drop.
    _lock: File,
}

impl FileDocumentStore {
    /// Opens (creating if needed) a store directory and takes its lock.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(dir.join(".lock"))?;
        lock.try_lock_exclusive()
            .map_err(|e| StoreError::Unavailable(format!("store directory locked: {e}")))?;

        let mut tables = Tables::default();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(collection) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let docs: Vec<Value> = serde_json::from_str(&fs::read_to_string(&path)?)?;
            for doc in docs {
                tables.insert(collection, doc)?;
            }
            debug!(collection, "loaded collection from disk");
        }

        Ok(Self {
            dir,
            inner: RwLock::new(tables),
            _lock: lock,
        })
    }

    fn flush(&self, tables: &Tables, collection: &str) -> Result<(), StoreError> {
        let docs: Vec<&Value> = tables
            .tables
            .get(collection)
            .map(|t| t.docs.values().collect())
            .unwrap_or_default();
        let path = self.dir.join(format!("{collection}.json"));
        let tmp = self.dir.join(format!("{collection}.json.tmp"));
        fs::write(&tmp, serde_json::to_vec_pretty(&docs)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn ensure_index(&self, _collection: &str, _index: IndexSpec) -> Result<(), StoreError> {
        // Index enforcement happens in the shared engine on insert; the file
        // layout itself has no index structures to create.
        Ok(())
    }

    async fn declare_shard_key(
        &self,
        _collection: &str,
        _fields: &[&str],
    ) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert(&self, collection: &str, doc: Value) -> Result<(), StoreError> {
        let mut tables = self.inner.write().expect("store lock");
        tables.insert(collection, doc)?;
        self.flush(&tables, collection)
    }

    async fn upsert(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError> {
        let mut tables = self.inner.write().expect("store lock");
        tables.upsert(collection, id, doc)?;
        self.flush(&tables, collection)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let tables = self.inner.read().expect("store lock");
        Ok(tables
            .tables
            .get(collection)
            .and_then(|t| t.docs.get(id))
            .cloned())
    }

    async fn find(
        &self,
        collection: &str,
        filter: Filter,
        options: FindOptions,
    ) -> Result<Vec<Value>, StoreError> {
        let tables = self.inner.read().expect("store lock");
        Ok(tables.find(collection, &filter, &options))
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Filter,
        options: FindOptions,
    ) -> Result<Option<Value>, StoreError> {
        let options = FindOptions {
            limit: Some(1),
            ..options
        };
        let tables = self.inner.read().expect("store lock");
        Ok(tables.find(collection, &filter, &options).into_iter().next())
    }

    async fn update(
        &self,
        collection: &str,
        filter: Filter,
        set: Value,
    ) -> Result<u64, StoreError> {
        let mut tables = self.inner.write().expect("store lock");
        let updated = tables.update(collection, &filter, &set)?;
        if updated > 0 {
            self.flush(&tables, collection)?;
        }
        Ok(updated)
    }

    async fn delete(&self, collection: &str, filter: Filter) -> Result<u64, StoreError> {
        let mut tables = self.inner.write().expect("store lock");
        let removed = tables.delete(collection, &filter);
        if removed > 0 {
            self.flush(&tables, collection)?;
        }
        Ok(removed)
    }

    async fn count(&self, collection: &str, filter: Filter) -> Result<u64, StoreError> {
        let tables = self.inner.read().expect("store lock");
        Ok(tables.find(collection, &filter, &FindOptions::default()).len() as u64)
    }

    async fn sum(
        &self,
        collection: &str,
        filter: Filter,
        field: &str,
    ) -> Result<f64, StoreError> {
        let tables = self.inner.read().expect("store lock");
        Ok(tables
            .find(collection, &filter, &FindOptions::default())
            .iter()
            .filter_map(|doc| crate::filter::lookup(doc, field))
            .map(|v| match v {
                Value::Number(n) => n.as_f64().unwrap_or(0.0),
                Value::String(s) => s.parse().unwrap_or(0.0),
                _ => 0.0,
            })
            .sum())
    }

    async fn group_stats(
        &self,
        collection: &str,
        filter: Filter,
        group_field: &str,
        sum_field: Option<&str>,
    ) -> Result<HashMap<String, GroupStats>, StoreError> {
        let tables = self.inner.read().expect("store lock");
        let mut groups: HashMap<String, GroupStats> = HashMap::new();
        for doc in tables.find(collection, &filter, &FindOptions::default()) {
            let group = match crate::filter::lookup(&doc, group_field) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => continue,
            };
            let entry = groups.entry(group).or_default();
            entry.count += 1;
            if let Some(field) = sum_field {
                entry.sum += crate::filter::lookup(&doc, field)
                    .map(|v| match v {
                        Value::Number(n) => n.as_f64().unwrap_or(0.0),
                        Value::String(s) => s.parse().unwrap_or(0.0),
                        _ => 0.0,
                    })
                    .unwrap_or(0.0);
            }
        }
        Ok(groups)
    }
}
