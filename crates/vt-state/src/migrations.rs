//! Schema migrations for the SQLite store.

use sqlx::SqlitePool;
use tracing::{info, instrument};

use crate::error::StoreError;

const SCHEMA_VERSION: i64 = 1;

#[instrument(skip(pool))]
pub async fn run(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| StoreError::Migration(e.to_string()))?;

    let current_version: Option<i64> =
        sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;
    let current_version = current_version.unwrap_or(0);

    if current_version >= SCHEMA_VERSION {
        info!(version = current_version, "Database schema is up to date");
        return Ok(());
    }

    info!(
        from = current_version,
        to = SCHEMA_VERSION,
        "Migrating database schema"
    );

    if current_version < 1 {
        migrate_to_v1(pool).await?;
    }

    Ok(())
}

#[instrument(skip(pool))]
async fn migrate_to_v1(pool: &SqlitePool) -> Result<(), StoreError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| StoreError::Migration(e.to_string()))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kv (
            bucket TEXT NOT NULL,
            key BLOB NOT NULL,
            value BLOB NOT NULL,
            PRIMARY KEY (bucket, key)
        )
        "#,
    )
    .execute(&mut *tx)
    .await
    .map_err(|e| StoreError::Migration(e.to_string()))?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (1)")
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Migration(e.to_string()))?;

    tx.commit()
        .await
        .map_err(|e| StoreError::Migration(e.to_string()))?;

    Ok(())
}
