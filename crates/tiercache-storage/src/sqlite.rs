//! SQLite blob store backend

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::backend::{BlobStore, validate_region};
use crate::error::StorageError;

/// SQLite-backed blob store
///
/// All regions share one `blobs` table. The autoincrement `seq` column is the
/// insertion order; replacing a key deletes and re-inserts it inside a single
/// transaction so a failed write never loses the previous value.
pub struct SqliteBlobStore {
    pool: SqlitePool,
    opened: RwLock<HashSet<String>>,
}

impl SqliteBlobStore {
    /// Open (or create) a store at the given file path
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
        }

        info!("Opening blob store at {:?}", path);

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Create a store backed by a private in-memory database
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new().in_memory(true);
        // Every connection to :memory: is a separate database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        let store = Self {
            pool,
            opened: RwLock::new(HashSet::new()),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS blobs (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                region TEXT NOT NULL,
                key TEXT NOT NULL,
                data BLOB NOT NULL,
                UNIQUE(region, key)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_blobs_region_seq ON blobs(region, seq)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn ensure_open(&self, region: &str) -> Result<(), StorageError> {
        if self.opened.read().contains(region) {
            Ok(())
        } else {
            Err(StorageError::RegionNotOpen(region.to_string()))
        }
    }
}

#[async_trait]
impl BlobStore for SqliteBlobStore {
    async fn open(&self, region: &str) -> Result<(), StorageError> {
        validate_region(region)?;
        self.opened.write().insert(region.to_string());
        debug!("Opened region {}", region);
        Ok(())
    }

    async fn get(&self, region: &str, key: &str) -> Result<Option<Bytes>, StorageError> {
        self.ensure_open(region)?;

        let row = sqlx::query("SELECT data FROM blobs WHERE region = ? AND key = ?")
            .bind(region)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| Bytes::from(row.get::<Vec<u8>, _>("data"))))
    }

    async fn put(&self, region: &str, key: &str, data: Bytes) -> Result<(), StorageError> {
        self.ensure_open(region)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM blobs WHERE region = ? AND key = ?")
            .bind(region)
            .bind(key)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO blobs (region, key, data) VALUES (?, ?, ?)")
            .bind(region)
            .bind(key)
            .bind(data.as_ref())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, region: &str, key: &str) -> Result<bool, StorageError> {
        self.ensure_open(region)?;

        let result = sqlx::query("DELETE FROM blobs WHERE region = ? AND key = ?")
            .bind(region)
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn keys(&self, region: &str) -> Result<Vec<String>, StorageError> {
        self.ensure_open(region)?;

        let rows = sqlx::query("SELECT key FROM blobs WHERE region = ? ORDER BY seq ASC")
            .bind(region)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get::<String, _>("key")).collect())
    }

    async fn size(&self, region: &str) -> Result<u64, StorageError> {
        self.ensure_open(region)?;

        let row = sqlx::query(
            "SELECT COALESCE(SUM(LENGTH(data)), 0) AS total FROM blobs WHERE region = ?",
        )
        .bind(region)
        .fetch_one(&self.pool)
        .await?;

        let total: i64 = row.get("total");
        Ok(total.max(0) as u64)
    }
}
