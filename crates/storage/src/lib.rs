use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A stored document: always a JSON object at the top level.
pub type Document = Map<String, Value>;

/// Filter applied to every document of a collection during `query`.
pub type Predicate = dyn Fn(&Document) -> bool + Send + Sync;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    #[error("document {collection}/{id} does not exist")]
    Missing { collection: String, id: String },
    #[error("document {collection}/{id} is corrupt: {reason}")]
    Corrupt {
        collection: String,
        id: String,
        reason: String,
    },
    #[error("document store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether repeating the same read may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(error.to_string()),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Collection-keyed document store. Ids are opaque strings.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Documents of `collection` accepted by `predicate`, ordered by id.
    async fn query(
        &self,
        collection: &str,
        predicate: &Predicate,
    ) -> Result<Vec<(String, Document)>, StoreError>;

    async fn set(&self, collection: &str, id: &str, document: Document) -> Result<(), StoreError>;

    /// Merges the top-level fields of `partial` into an existing document.
    async fn update(&self, collection: &str, id: &str, partial: Document)
        -> Result<(), StoreError>;

    /// Writes `document` only when nothing is stored under `id` yet.
    /// Returns whether this call created it.
    async fn create(&self, collection: &str, id: &str, document: Document)
        -> Result<bool, StoreError>;

    /// Appends each of `values` missing from the array `field` of an existing
    /// document, in one atomic step. An absent field counts as empty.
    /// Returns how many values were appended.
    async fn array_union(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<Value>,
    ) -> Result<usize, StoreError>;

    /// Adds `delta` to the integer `field` of an existing document in one
    /// atomic step and returns the new value. An absent field counts as zero.
    async fn increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: u64,
    ) -> Result<u64, StoreError>;
}

#[async_trait]
impl<T> DocumentStore for std::sync::Arc<T>
where
    T: DocumentStore + ?Sized,
{
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        (**self).get(collection, id).await
    }

    async fn query(
        &self,
        collection: &str,
        predicate: &Predicate,
    ) -> Result<Vec<(String, Document)>, StoreError> {
        (**self).query(collection, predicate).await
    }

    async fn set(&self, collection: &str, id: &str, document: Document) -> Result<(), StoreError> {
        (**self).set(collection, id, document).await
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        partial: Document,
    ) -> Result<(), StoreError> {
        (**self).update(collection, id, partial).await
    }

    async fn create(
        &self,
        collection: &str,
        id: &str,
        document: Document,
    ) -> Result<bool, StoreError> {
        (**self).create(collection, id, document).await
    }

    async fn array_union(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<Value>,
    ) -> Result<usize, StoreError> {
        (**self).array_union(collection, id, field, values).await
    }

    async fn increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: u64,
    ) -> Result<u64, StoreError> {
        (**self).increment(collection, id, field, delta).await
    }
}

pub fn to_document<T: Serialize>(
    collection: &str,
    id: &str,
    value: &T,
) -> Result<Document, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(corrupt(
            collection,
            id,
            format!("expected an object, got {other}"),
        )),
        Err(error) => Err(corrupt(collection, id, error.to_string())),
    }
}

pub fn from_document<T: DeserializeOwned>(
    collection: &str,
    id: &str,
    document: Document,
) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(document))
        .map_err(|error| corrupt(collection, id, error.to_string()))
}

pub(crate) fn merge_fields(target: &mut Document, partial: Document) {
    for (key, value) in partial {
        target.insert(key, value);
    }
}

pub(crate) fn union_field(
    document: &mut Document,
    collection: &str,
    id: &str,
    field: &str,
    values: Vec<Value>,
) -> Result<usize, StoreError> {
    let slot = document
        .entry(field.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    let Value::Array(items) = slot else {
        return Err(corrupt(collection, id, format!("field '{field}' is not an array")));
    };
    let mut appended = 0;
    for value in values {
        if !items.contains(&value) {
            items.push(value);
            appended += 1;
        }
    }
    Ok(appended)
}

pub(crate) fn increment_field(
    document: &mut Document,
    collection: &str,
    id: &str,
    field: &str,
    delta: u64,
) -> Result<u64, StoreError> {
    let current = match document.get(field) {
        None | Some(Value::Null) => 0,
        Some(value) => value.as_u64().ok_or_else(|| {
            corrupt(collection, id, format!("field '{field}' is not an unsigned integer"))
        })?,
    };
    let next = current.saturating_add(delta);
    document.insert(field.to_string(), Value::from(next));
    Ok(next)
}

pub(crate) fn missing(collection: &str, id: &str) -> StoreError {
    StoreError::Missing {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}

pub(crate) fn corrupt(collection: &str, id: &str, reason: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        collection: collection.to_string(),
        id: id.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
