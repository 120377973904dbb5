//! Single-file embedded store backed by SQLite.
//!
//! All buckets share one `kv` table; the bucket name is part of the primary
//! key. WAL journaling lets readers run while a writer holds the lock.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info, instrument};

use crate::error::StoreError;
use crate::migrations;
use crate::store::KvStore;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database file and apply migrations.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let filename = path
            .to_str()
            .ok_or_else(|| StoreError::InvalidPath(path.to_path_buf()))?;

        let options = SqliteConnectOptions::new()
            .filename(filename)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        migrations::run(&pool).await?;

        info!("Deployment store opened");
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let value: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT value FROM kv WHERE bucket = ? AND key = ?")
                .bind(bucket)
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    async fn put(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO kv (bucket, key, value) VALUES (?, ?, ?)
            ON CONFLICT(bucket, key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(bucket)
        .bind(key)
        .bind(value)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn insert(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO kv (bucket, key, value) VALUES (?, ?, ?)
            ON CONFLICT(bucket, key) DO NOTHING
            "#,
        )
        .bind(bucket)
        .bind(key)
        .bind(value)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        let inserted = result.rows_affected() == 1;
        debug!(bucket, inserted, "Insert-if-absent");
        Ok(inserted)
    }

    async fn scan(&self, bucket: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let rows = sqlx::query("SELECT key, value FROM kv WHERE bucket = ? ORDER BY key")
            .bind(bucket)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| -> Result<_, StoreError> {
                let key: Vec<u8> = row.try_get("key")?;
                let value: Vec<u8> = row.try_get("value")?;
                Ok((key, value))
            })
            .collect()
    }

    async fn delete(&self, bucket: &str, key: &[u8]) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM kv WHERE bucket = ? AND key = ?")
            .bind(bucket)
            .bind(key)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_creates_file_and_schema() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("store.db");

        let store = SqliteStore::open(&path).await.unwrap();
        assert!(path.exists());

        store.put("bucket", b"key", b"value").await.unwrap();
        assert_eq!(
            store.get("bucket", b"key").await.unwrap(),
            Some(b"value".to_vec())
        );
        store.close().await;

        // 再オープンでマイグレーションが重複適用されないこと
        let reopened = SqliteStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.get("bucket", b"key").await.unwrap(),
            Some(b"value".to_vec())
        );
    }

    #[tokio::test]
    async fn test_insert_put_scan_delete() {
        let temp = tempdir().unwrap();
        let store = SqliteStore::open(temp.path().join("kv.db")).await.unwrap();

        assert!(store.insert("b", b"2", b"two").await.unwrap());
        assert!(store.insert("b", b"1", b"one").await.unwrap());
        assert!(!store.insert("b", b"1", b"uno").await.unwrap());
        store.put("other", b"1", b"x").await.unwrap();

        let entries = store.scan("b").await.unwrap();
        assert_eq!(
            entries,
            vec![
                (b"1".to_vec(), b"one".to_vec()),
                (b"2".to_vec(), b"two".to_vec())
            ]
        );

        store.put("b", b"1", b"uno").await.unwrap();
        assert_eq!(store.get("b", b"1").await.unwrap(), Some(b"uno".to_vec()));

        assert!(store.delete("b", b"1").await.unwrap());
        assert!(!store.delete("b", b"1").await.unwrap());
        assert_eq!(store.scan("other").await.unwrap().len(), 1);
    }
}
