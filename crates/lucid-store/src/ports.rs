//! Document-store port.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;
use crate::filter::{Filter, FindOptions};

/// Declarative index specification.
#[derive(Debug, Clone)]
pub struct IndexSpec {
    /// Indexed field paths, in order for compound indexes.
    pub fields: Vec<String>,
    pub unique: bool,
}

impl IndexSpec {
    pub fn unique(fields: &[&str]) -> Self {
        Self {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            unique: true,
        }
    }

    pub fn plain(fields: &[&str]) -> Self {
        Self {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            unique: false,
        }
    }
}

/// Per-group aggregation row returned by [`DocumentStore::group_stats`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupStats {
    pub count: u64,
    pub sum: f64,
}

/// The sharded document store every component programs against.
///
/// Documents are JSON objects carrying a string `_id`. Writes go to the
/// primary of the owning shard; adapters may serve reads from secondaries.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Declares an index. Idempotent; called by components at startup.
    async fn ensure_index(&self, collection: &str, index: IndexSpec) -> Result<(), StoreError>;

    /// Declares the shard key for a collection. Idempotent.
    async fn declare_shard_key(&self, collection: &str, fields: &[&str])
        -> Result<(), StoreError>;

    /// Inserts a new document. Fails with [`StoreError::DuplicateKey`] when
    /// the `_id` or any unique index rejects it.
    async fn insert(&self, collection: &str, doc: Value) -> Result<(), StoreError>;

    /// Inserts or fully replaces the document with the given id.
    async fn upsert(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError>;

    /// Fetches a document by id.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Returns documents matching `filter`, sorted and paginated.
    async fn find(
        &self,
        collection: &str,
        filter: Filter,
        options: FindOptions,
    ) -> Result<Vec<Value>, StoreError>;

    /// First match, honoring the sort in `options`.
    async fn find_one(
        &self,
        collection: &str,
        filter: Filter,
        options: FindOptions,
    ) -> Result<Option<Value>, StoreError>;

    /// Merges `set` (top-level fields) into every matching document.
    /// Returns the number of documents updated.
    async fn update(
        &self,
        collection: &str,
        filter: Filter,
        set: Value,
    ) -> Result<u64, StoreError>;

    /// Deletes matching documents, returning how many were removed.
    async fn delete(&self, collection: &str, filter: Filter) -> Result<u64, StoreError>;

    /// Counts matching documents.
    async fn count(&self, collection: &str, filter: Filter) -> Result<u64, StoreError>;

    /// Sums a numeric field over matching documents. Numeric strings (as the
    /// payout collections store decimal amounts) are coerced.
    async fn sum(&self, collection: &str, filter: Filter, field: &str)
        -> Result<f64, StoreError>;

    /// Groups matching documents by a field, returning per-group count and
    /// the sum of `sum_field` (0.0 when absent).
    async fn group_stats(
        &self,
        collection: &str,
        filter: Filter,
        group_field: &str,
        sum_field: Option<&str>,
    ) -> Result<HashMap<String, GroupStats>, StoreError>;
}
