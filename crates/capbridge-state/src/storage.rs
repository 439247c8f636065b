//! SQLite-backed settings store
//!
//! Settings are JSON values keyed by name in a single `settings` table.
//! Reads go through a small in-memory cache that every write refreshes.

use async_trait::async_trait;
use capbridge_engine::{BridgeError, SettingsStore};
use parking_lot::RwLock;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{Result, StateError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
)
"#;

/// Settings persisted in a SQLite database
pub struct SqliteSettings {
    pool: SqlitePool,
    cache: RwLock<HashMap<String, serde_json::Value>>,
}

impl SqliteSettings {
    /// Open (or create) a database file
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        info!(path = %path.display(), "Opened settings database");
        Self::with_pool(pool).await
    }

    /// Open a private in-memory database
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // Each connection to :memory: is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;
        Self::with_pool(pool).await
    }

    /// Use an existing pool, creating the schema if needed
    pub async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self {
            pool,
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Read a value
    pub async fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>> {
        if let Some(value) = self.cache.read().get(key).cloned() {
            return Ok(Some(value));
        }

        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        let Some((raw,)) = row else {
            return Ok(None);
        };

        let value: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| StateError::Deserialization {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        self.cache.write().insert(key.to_string(), value.clone());
        Ok(Some(value))
    }

    /// Write a value, replacing any previous one
    pub async fn set_value(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        if key.is_empty() {
            return Err(StateError::InvalidData("settings key must not be empty".into()));
        }
        let raw = serde_json::to_string(value)?;
        sqlx::query(
            "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, datetime('now')) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(&raw)
        .execute(&self.pool)
        .await?;

        self.cache.write().insert(key.to_string(), value.clone());
        debug!(key = %key, bytes = raw.len(), "Stored setting");
        Ok(())
    }

    /// Delete a value; returns whether it existed
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        self.cache.write().remove(key);
        Ok(result.rows_affected() > 0)
    }

    /// Every stored key, sorted
    pub async fn keys(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT key FROM settings ORDER BY key")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(key,)| key).collect())
    }

    /// Close the pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl SettingsStore for SqliteSettings {
    async fn get(&self, key: &str) -> std::result::Result<Option<serde_json::Value>, BridgeError> {
        Ok(self.get_value(key).await?)
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> std::result::Result<(), BridgeError> {
        Ok(self.set_value(key, &value).await?)
    }
}
