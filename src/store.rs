use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

pub fn ensure_sqlite_file(dsn: &str) -> Result<(), String> {
    let dsn = dsn.trim();
    if !dsn.starts_with("sqlite://") {
        return Ok(());
    }
    if dsn.contains(":memory:") || dsn.contains("mode=memory") {
        return Ok(());
    }
    let path_part = dsn.trim_start_matches("sqlite://");
    let path_part = path_part.split('?').next().unwrap_or("");
    if path_part.is_empty() {
        return Ok(());
    }
    let path = PathBuf::from(path_part);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|err| format!("sqlite_dir_create_failed: {err}"))?;
        }
    }
    if !path.exists() {
        std::fs::File::create(&path).map_err(|err| format!("sqlite_file_create_failed: {err}"))?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: String,
    pub value: Value,
}

/// Opaque key/value substrate shared by the token pool and the OAuth
/// plumbing. Records are namespaced by `kind` and addressed by `id`;
/// writes to the same key are linearizable, cross-key atomicity is not
/// provided.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn put(&self, kind: &str, id: &str, value: Value) -> Result<(), String>;
    async fn get(&self, kind: &str, id: &str) -> Result<Option<StoredRecord>, String>;
    async fn delete(&self, kind: &str, id: &str) -> Result<(), String>;
    async fn list(&self, kind: &str) -> Result<Vec<StoredRecord>, String>;
}

#[derive(Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<HashMap<(String, String), StoredRecord>>>,
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn put(&self, kind: &str, id: &str, value: Value) -> Result<(), String> {
        let mut guard = self.inner.write().await;
        guard.insert(
            (kind.to_string(), id.to_string()),
            StoredRecord {
                id: id.to_string(),
                value,
            },
        );
        Ok(())
    }

    async fn get(&self, kind: &str, id: &str) -> Result<Option<StoredRecord>, String> {
        let guard = self.inner.read().await;
        Ok(guard.get(&(kind.to_string(), id.to_string())).cloned())
    }

    async fn delete(&self, kind: &str, id: &str) -> Result<(), String> {
        let mut guard = self.inner.write().await;
        guard.remove(&(kind.to_string(), id.to_string()));
        Ok(())
    }

    async fn list(&self, kind: &str) -> Result<Vec<StoredRecord>, String> {
        let guard = self.inner.read().await;
        let mut out = Vec::new();
        for ((k, _), record) in guard.iter() {
            if k == kind {
                out.push(record.clone());
            }
        }
        Ok(out)
    }
}

#[derive(Clone)]
pub struct SqliteStateStore {
    pool: Pool<Sqlite>,
}

impl SqliteStateStore {
    pub async fn new(dsn: &str) -> Result<Self, String> {
        ensure_sqlite_file(dsn)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(
                dsn.parse::<sqlx::sqlite::SqliteConnectOptions>()
                    .map_err(|err| err.to_string())?
                    .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                    .busy_timeout(std::time::Duration::from_secs(5)),
            )
            .await
            .map_err(|err| err.to_string())?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS kv_records (\
             kind TEXT NOT NULL,\
             id TEXT NOT NULL,\
             value TEXT NOT NULL,\
             PRIMARY KEY (kind, id)\
             )",
        )
        .execute(&pool)
        .await
        .map_err(|err| err.to_string())?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn put(&self, kind: &str, id: &str, value: Value) -> Result<(), String> {
        let value_text = serde_json::to_string(&value).map_err(|err| err.to_string())?;
        sqlx::query(
            "INSERT INTO kv_records (kind, id, value) VALUES (?, ?, ?)\
             ON CONFLICT(kind, id) DO UPDATE SET value=excluded.value",
        )
        .bind(kind)
        .bind(id)
        .bind(value_text)
        .execute(&self.pool)
        .await
        .map_err(|err| err.to_string())?;
        Ok(())
    }

    async fn get(&self, kind: &str, id: &str) -> Result<Option<StoredRecord>, String> {
        let row = sqlx::query_as::<_, (String,)>(
            "SELECT value FROM kv_records WHERE kind=? AND id=?",
        )
        .bind(kind)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| err.to_string())?;
        if let Some((value_text,)) = row {
            let value: Value = serde_json::from_str(&value_text).map_err(|err| err.to_string())?;
            Ok(Some(StoredRecord {
                id: id.to_string(),
                value,
            }))
        } else {
            Ok(None)
        }
    }

    async fn delete(&self, kind: &str, id: &str) -> Result<(), String> {
        sqlx::query("DELETE FROM kv_records WHERE kind=? AND id=?")
            .bind(kind)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|err| err.to_string())?;
        Ok(())
    }

    async fn list(&self, kind: &str) -> Result<Vec<StoredRecord>, String> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT id, value FROM kv_records WHERE kind=? ORDER BY id",
        )
        .bind(kind)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| err.to_string())?;
        let mut out = Vec::new();
        for (id, value_text) in rows {
            let value: Value = serde_json::from_str(&value_text).map_err(|err| err.to_string())?;
            out.push(StoredRecord { id, value });
        }
        Ok(out)
    }
}
