use async_trait::async_trait;

use crate::error::StoreError;

/// Byte-oriented key-value storage with named buckets.
///
/// A bucket is a namespace: the same key may exist in two buckets
/// without conflict. Every write is atomic.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Insert or overwrite.
    async fn put(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Insert only when the key is absent. Returns `false` if it already existed.
    async fn insert(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<bool, StoreError>;

    /// All entries of a bucket, ordered by key.
    async fn scan(&self, bucket: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;

    /// Returns `true` if a row was removed.
    async fn delete(&self, bucket: &str, key: &[u8]) -> Result<bool, StoreError>;
}
