//! Typed collection wrapper.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::StoreError;
use crate::filter::{Filter, FindOptions};
use crate::ports::{DocumentStore, IndexSpec};

/// A named collection with a fixed document type.
///
/// Thin convenience over the raw [`DocumentStore`] port: serializes on the
/// way in, deserializes on the way out, and strips the storage-level `_id`
/// before handing documents back.
#[derive(Clone)]
pub struct Collection<T> {
    store: Arc<dyn DocumentStore>,
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(store: Arc<dyn DocumentStore>, name: &'static str) -> Self {
        Self {
            store,
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub async fn ensure_index(&self, index: IndexSpec) -> Result<(), StoreError> {
        self.store.ensure_index(self.name, index).await
    }

    pub async fn declare_shard_key(&self, fields: &[&str]) -> Result<(), StoreError> {
        self.store.declare_shard_key(self.name, fields).await
    }

    pub async fn insert(&self, id: &str, value: &T) -> Result<(), StoreError> {
        self.store.insert(self.name, to_doc(id, value)?).await
    }

    pub async fn upsert(&self, id: &str, value: &T) -> Result<(), StoreError> {
        self.store.upsert(self.name, id, to_doc(id, value)?).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<T>, StoreError> {
        self.store
            .get(self.name, id)
            .await?
            .map(from_doc)
            .transpose()
    }

    pub async fn find(&self, filter: Filter, options: FindOptions) -> Result<Vec<T>, StoreError> {
        self.store
            .find(self.name, filter, options)
            .await?
            .into_iter()
            .map(from_doc)
            .collect()
    }

    pub async fn find_one(
        &self,
        filter: Filter,
        options: FindOptions,
    ) -> Result<Option<T>, StoreError> {
        self.store
            .find_one(self.name, filter, options)
            .await?
            .map(from_doc)
            .transpose()
    }

    /// Merges top-level fields into matching documents.
    pub async fn update(&self, filter: Filter, set: Value) -> Result<u64, StoreError> {
        self.store.update(self.name, filter, set).await
    }

    pub async fn delete(&self, filter: Filter) -> Result<u64, StoreError> {
        self.store.delete(self.name, filter).await
    }

    pub async fn count(&self, filter: Filter) -> Result<u64, StoreError> {
        self.store.count(self.name, filter).await
    }
}

fn to_doc<T: Serialize>(id: &str, value: &T) -> Result<Value, StoreError> {
    let mut doc = serde_json::to_value(value)?;
    match &mut doc {
        Value::Object(map) => {
            map.insert("_id".to_string(), Value::String(id.to_string()));
            Ok(doc)
        }
        _ => Err(StoreError::Serialization(serde::ser::Error::custom(
            "documents must serialize to JSON objects",
        ))),
    }
}

fn from_doc<T: DeserializeOwned>(mut doc: Value) -> Result<T, StoreError> {
    if let Value::Object(map) = &mut doc {
        map.remove("_id");
    }
    Ok(serde_json::from_value(doc)?)
}
