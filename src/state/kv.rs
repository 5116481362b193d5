// Asynchronous key/value store
// The plant collection is persisted as text under a single key
use rusqlite::{params, OptionalExtension};
use std::future::Future;
use thiserror::Error;
use tokio::task::JoinError;

use super::db::{DbConnection, DbError, DbResult};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read '{key}' from store: {source}")]
    Read { key: String, source: DbError },

    #[error("Failed to write '{key}' to store: {source}")]
    Write { key: String, source: DbError },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store task failed: {0}")]
    Join(#[from] JoinError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Minimal async key/value contract used by the record store
pub trait KeyValueStore: Send + Sync + 'static {
    fn get_item(&self, key: &str) -> impl Future<Output = StoreResult<Option<String>>> + Send;

    fn set_item(&self, key: &str, value: String) -> impl Future<Output = StoreResult<()>> + Send;
}

/// SQLite-backed store. Blocking calls run on the tokio blocking pool.
#[derive(Clone)]
pub struct SqliteKvStore {
    db: DbConnection,
}

impl SqliteKvStore {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }
}

impl KeyValueStore for SqliteKvStore {
    async fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        let db = self.db.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            read_item(&db, &key).map_err(|source| StoreError::Read { key, source })
        })
        .await?
    }

    async fn set_item(&self, key: &str, value: String) -> StoreResult<()> {
        let db = self.db.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            write_item(&db, &key, &value).map_err(|source| StoreError::Write { key, source })
        })
        .await?
    }
}

fn read_item(db: &DbConnection, key: &str) -> DbResult<Option<String>> {
    let conn = db.lock();
    let value = conn
        .query_row("SELECT value FROM state WHERE key = ?1", [key], |row| {
            row.get::<_, String>(0)
        })
        .optional()?;
    Ok(value)
}

fn write_item(db: &DbConnection, key: &str, value: &str) -> DbResult<()> {
    let conn = db.lock();
    conn.execute(
        "INSERT INTO state (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value],
    )?;
    Ok(())
}
