use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite, SqliteConnection,
};
use tracing::{debug, warn};

use crate::{
    corrupt, increment_field, merge_fields, missing, union_field, Document, DocumentStore,
    Predicate, StoreError,
};

/// Document store persisted in a single SQLite table keyed by (collection, id).
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn open(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid sqlite database url '{database_url}'"))?
            .create_if_missing(true);
        // In-memory databases vanish with their last connection.
        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            5
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open sqlite database '{database_url}'"))?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to apply document store migrations")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }
}

fn decode_body(collection: &str, id: &str, body: &str) -> Result<Document, StoreError> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(corrupt(collection, id, "stored body is not a JSON object")),
        Err(error) => Err(corrupt(collection, id, error.to_string())),
    }
}

fn encode_body(collection: &str, id: &str, document: &Document) -> Result<String, StoreError> {
    serde_json::to_string(document).map_err(|error| corrupt(collection, id, error.to_string()))
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query("SELECT body FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| decode_body(collection, id, &r.get::<String, _>(0)))
            .transpose()
    }

    async fn query(
        &self,
        collection: &str,
        predicate: &Predicate,
    ) -> Result<Vec<(String, Document)>, StoreError> {
        let rows = sqlx::query("SELECT id, body FROM documents WHERE collection = ? ORDER BY id")
            .bind(collection)
            .fetch_all(&self.pool)
            .await?;

        let mut matches = Vec::new();
        for row in rows {
            let id: String = row.get(0);
            let document = decode_body(collection, &id, &row.get::<String, _>(1))?;
            if predicate(&document) {
                matches.push((id, document));
            }
        }
        debug!(collection, matched = matches.len(), "sqlite: query finished");
        Ok(matches)
    }

    async fn set(&self, collection: &str, id: &str, document: Document) -> Result<(), StoreError> {
        let body = encode_body(collection, id, &document)?;
        sqlx::query(
            "INSERT INTO documents (collection, id, body) VALUES (?, ?, ?)
             ON CONFLICT(collection, id) DO UPDATE SET body = excluded.body, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(collection)
        .bind(id)
        .bind(body)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        partial: Document,
    ) -> Result<(), StoreError> {
        self.read_modify_write(collection, id, |document| {
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
        let body = encode_body(collection, id, &document)?;
        let result = sqlx::query(
            "INSERT INTO documents (collection, id, body) VALUES (?, ?, ?)
             ON CONFLICT(collection, id) DO NOTHING",
        )
        .bind(collection)
        .bind(id)
        .bind(body)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn array_union(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<Value>,
    ) -> Result<usize, StoreError> {
        self.read_modify_write(collection, id, |document| {
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
        self.read_modify_write(collection, id, |document| {
            increment_field(document, collection, id, field, delta)
        })
        .await
    }
}

impl SqliteStore {
    /// Runs `apply` against one document inside a `BEGIN IMMEDIATE`
    /// transaction. The write lock is taken before the read, so writers on
    /// other connections or processes queue behind it instead of
    /// overwriting each other.
    async fn read_modify_write<T, F>(
        &self,
        collection: &str,
        id: &str,
        apply: F,
    ) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Document) -> Result<T, StoreError> + Send,
        T: Send,
    {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result = modify_locked(&mut *conn, collection, id, apply).await;
        let finish = if result.is_ok() { "COMMIT" } else { "ROLLBACK" };
        if let Err(error) = sqlx::query(finish).execute(&mut *conn).await {
            if result.is_ok() {
                return Err(error.into());
            }
            warn!(collection, id, %error, "sqlite: rollback failed");
        }
        result
    }
}

async fn modify_locked<T, F>(
    conn: &mut SqliteConnection,
    collection: &str,
    id: &str,
    apply: F,
) -> Result<T, StoreError>
where
    F: FnOnce(&mut Document) -> Result<T, StoreError>,
{
    let row = sqlx::query("SELECT body FROM documents WHERE collection = ? AND id = ?")
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(row) = row else {
        return Err(missing(collection, id));
    };

    let mut document = decode_body(collection, id, &row.get::<String, _>(0))?;
    let result = apply(&mut document)?;
    let body = encode_body(collection, id, &document)?;

    sqlx::query(
        "UPDATE documents SET body = ?, updated_at = CURRENT_TIMESTAMP WHERE collection = ? AND id = ?",
    )
    .bind(body)
    .bind(collection)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(result)
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.contains(":memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/sqlite_tests.rs"]
mod tests;
