use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{
    increment_field, merge_fields, missing, union_field, Document, DocumentStore, Predicate,
    StoreError,
};

/// In-process document store. Clones share the same collections, and every
/// write runs under one write lock, so field operations are atomic across clones.
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, BTreeMap<String, Document>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn modify<T>(
        &self,
        collection: &str,
        id: &str,
        apply: impl FnOnce(&mut Document) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.collections.write().await;
        let existing = guard
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
            .ok_or_else(|| missing(collection, id))?;
        // Work on a copy so a failed operation leaves the document untouched.
        let mut draft = existing.clone();
        let result = apply(&mut draft)?;
        *existing = draft;
        Ok(result)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let guard = self.collections.read().await;
        Ok(guard
            .get(collection)
            .and_then(|documents| documents.get(id))
            .cloned())
    }

    async fn query(
        &self,
        collection: &str,
        predicate: &Predicate,
    ) -> Result<Vec<(String, Document)>, StoreError> {
        let guard = self.collections.read().await;
        let Some(documents) = guard.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(documents
            .iter()
            .filter(|(_, document)| predicate(document))
            .map(|(id, document)| (id.clone(), document.clone()))
            .collect())
    }

    async fn set(&self, collection: &str, id: &str, document: Document) -> Result<(), StoreError> {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document);
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        partial: Document,
    ) -> Result<(), StoreError> {
        self.modify(collection, id, |document| {
            merge_fields(document, partial);
            Ok(())
        })
        .await
    }

    async fn create(
        &self,
        collection: &str,
        id: &str,
        document: Document,
    ) -> Result<bool, StoreError> {
        let mut guard = self.collections.write().await;
        let documents = guard.entry(collection.to_string()).or_default();
        if documents.contains_key(id) {
            return Ok(false);
        }
        documents.insert(id.to_string(), document);
        Ok(true)
    }

    async fn array_union(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<Value>,
    ) -> Result<usize, StoreError> {
        self.modify(collection, id, |document| {
            union_field(document, collection, id, field, values)
        })
        .await
    }

    async fn increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: u64,
    ) -> Result<u64, StoreError> {
        self.modify(collection, id, |document| {
            increment_field(document, collection, id, field, delta)
        })
        .await
    }
}
