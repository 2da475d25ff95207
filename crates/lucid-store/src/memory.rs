//! In-memory store adapter.
//!
//! Full-semantics reference adapter: unique and compound indexes, filtered
//! queries, aggregation. Unit tests run against this; the file adapter
//! reuses the same engine with write-through persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;
use crate::filter::{lookup, sort_documents, Filter, FindOptions};
use crate::ports::{DocumentStore, GroupStats, IndexSpec};

const KEY_SEPARATOR: char = '\u{1f}';

#[derive(Default)]
pub(crate) struct Table {
    pub(crate) docs: BTreeMap<String, Value>,
    indexes: Vec<IndexSpec>,
    shard_key: Option<Vec<String>>,
}

impl Table {
    fn index_key(index: &IndexSpec, doc: &Value) -> String {
        let mut key = String::new();
        for field in &index.fields {
            let rendered = match lookup(doc, field) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            key.push_str(&rendered);
            key.push(KEY_SEPARATOR);
        }
        key
    }

    /// Checks every unique index against `doc`, ignoring the document that
    /// currently holds `exclude_id` (for replacement writes).
    fn check_unique(
        &self,
        collection: &str,
        doc: &Value,
        exclude_id: Option<&str>,
    ) -> Result<(), StoreError> {
        for index in self.indexes.iter().filter(|i| i.unique) {
            let key = Self::index_key(index, doc);
            let clash = self.docs.iter().any(|(id, existing)| {
                Some(id.as_str()) != exclude_id && Self::index_key(index, existing) == key
            });
            if clash {
                return Err(StoreError::DuplicateKey {
                    collection: collection.to_string(),
                    key: format!("{}={}", index.fields.join("+"), key.replace(KEY_SEPARATOR, ",")),
                });
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct Tables {
    pub(crate) tables: HashMap<String, Table>,
}

impl Tables {
    fn table_mut(&mut self, collection: &str) -> &mut Table {
        self.tables.entry(collection.to_string()).or_default()
    }

    pub(crate) fn insert(&mut self, collection: &str, doc: Value) -> Result<(), StoreError> {
        let id = doc_id(collection, &doc)?;
        let table = self.table_mut(collection);
        if table.docs.contains_key(&id) {
            return Err(StoreError::DuplicateKey {
                collection: collection.to_string(),
                key: format!("_id={id}"),
            });
        }
        table.check_unique(collection, &doc, None)?;
        table.docs.insert(id, doc);
        Ok(())
    }

    pub(crate) fn upsert(
        &mut self,
        collection: &str,
        id: &str,
        mut doc: Value,
    ) -> Result<(), StoreError> {
        if let Value::Object(map) = &mut doc {
            map.insert("_id".to_string(), Value::String(id.to_string()));
        } else {
            return Err(StoreError::MissingId {
                collection: collection.to_string(),
            });
        }
        let table = self.table_mut(collection);
        table.check_unique(collection, &doc, Some(id))?;
        table.docs.insert(id.to_string(), doc);
        Ok(())
    }

    pub(crate) fn update(
        &mut self,
        collection: &str,
        filter: &Filter,
        set: &Value,
    ) -> Result<u64, StoreError> {
        let table = self.table_mut(collection);
        let mut updated = 0;
        for doc in table.docs.values_mut() {
            if filter.matches(doc) {
                if let (Value::Object(target), Value::Object(fields)) = (&mut *doc, set) {
                    for (k, v) in fields {
                        target.insert(k.clone(), v.clone());
                    }
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }

    pub(crate) fn delete(&mut self, collection: &str, filter: &Filter) -> u64 {
        let table = self.table_mut(collection);
        let before = table.docs.len();
        table.docs.retain(|_, doc| !filter.matches(doc));
        (before - table.docs.len()) as u64
    }

    pub(crate) fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Vec<Value> {
        let Some(table) = self.tables.get(collection) else {
            return Vec::new();
        };
        let mut matches: Vec<Value> = table
            .docs
            .values()
            .filter(|doc| filter.matches(doc))
            .cloned()
            .collect();
        if !options.sort.is_empty() {
            sort_documents(&mut matches, &options.sort);
        }
        matches
            .into_iter()
            .skip(options.skip)
            .take(options.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

fn doc_id(collection: &str, doc: &Value) -> Result<String, StoreError> {
    doc.get("_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| StoreError::MissingId {
            collection: collection.to_string(),
        })
}

fn numeric(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// In-memory document store.
#[derive(Default)]
pub struct MemoryDocumentStore {
    pub(crate) inner: RwLock<Tables>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn ensure_index(&self, collection: &str, index: IndexSpec) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("store lock");
        let table = inner.table_mut(collection);
        let exists = table.indexes.iter().any(|i| i.fields == index.fields);
        if !exists {
            table.indexes.push(index);
        }
        Ok(())
    }

    async fn declare_shard_key(
        &self,
        collection: &str,
        fields: &[&str],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("store lock");
        inner.table_mut(collection).shard_key =
            Some(fields.iter().map(|f| f.to_string()).collect());
        Ok(())
    }

    async fn insert(&self, collection: &str, doc: Value) -> Result<(), StoreError> {
        self.inner.write().expect("store lock").insert(collection, doc)
    }

    async fn upsert(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError> {
        self.inner
            .write()
            .expect("store lock")
            .upsert(collection, id, doc)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let inner = self.inner.read().expect("store lock");
        Ok(inner
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
        let inner = self.inner.read().expect("store lock");
        Ok(inner.find(collection, &filter, &options))
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
        let inner = self.inner.read().expect("store lock");
        Ok(inner.find(collection, &filter, &options).into_iter().next())
    }

    async fn update(
        &self,
        collection: &str,
        filter: Filter,
        set: Value,
    ) -> Result<u64, StoreError> {
        self.inner
            .write()
            .expect("store lock")
            .update(collection, &filter, &set)
    }

    async fn delete(&self, collection: &str, filter: Filter) -> Result<u64, StoreError> {
        Ok(self.inner.write().expect("store lock").delete(collection, &filter))
    }

    async fn count(&self, collection: &str, filter: Filter) -> Result<u64, StoreError> {
        let inner = self.inner.read().expect("store lock");
        Ok(inner.find(collection, &filter, &FindOptions::default()).len() as u64)
    }

    async fn sum(
        &self,
        collection: &str,
        filter: Filter,
        field: &str,
    ) -> Result<f64, StoreError> {
        let inner = self.inner.read().expect("store lock");
        Ok(inner
            .find(collection, &filter, &FindOptions::default())
            .iter()
            .filter_map(|doc| lookup(doc, field))
            .map(numeric)
            .sum())
    }

    async fn group_stats(
        &self,
        collection: &str,
        filter: Filter,
        group_field: &str,
        sum_field: Option<&str>,
    ) -> Result<HashMap<String, GroupStats>, StoreError> {
        let inner = self.inner.read().expect("store lock");
        let mut groups: HashMap<String, GroupStats> = HashMap::new();
        for doc in inner.find(collection, &filter, &FindOptions::default()) {
            let group = match lookup(&doc, group_field) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => continue,
            };
            let entry = groups.entry(group).or_default();
            entry.count += 1;
            if let Some(field) = sum_field {
                entry.sum += lookup(&doc, field).map(numeric).unwrap_or(0.0);
            }
        }
        Ok(groups)
    }
}
