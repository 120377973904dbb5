use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::KvStore;

type Key = (String, Vec<u8>);

/// In-process store, used for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<BTreeMap<Key, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let data = self.data.read().await;
        Ok(data.get(&(bucket.to_string(), key.to_vec())).cloned())
    }

    async fn put(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut data = self.data.write().await;
        data.insert((bucket.to_string(), key.to_vec()), value.to_vec());
        Ok(())
    }

    async fn insert(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<bool, StoreError> {
        let mut data = self.data.write().await;
        let key = (bucket.to_string(), key.to_vec());
        if data.contains_key(&key) {
            return Ok(false);
        }
        data.insert(key, value.to_vec());
        Ok(true)
    }

    async fn scan(&self, bucket: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let data = self.data.read().await;
        Ok(data
            .iter()
            .filter(|((b, _), _)| b == bucket)
            .map(|((_, k), v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn delete(&self, bucket: &str, key: &[u8]) -> Result<bool, StoreError> {
        let mut data = self.data.write().await;
        Ok(data.remove(&(bucket.to_string(), key.to_vec())).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_buckets_are_namespaces() {
        let store = MemoryStore::new();
        store.put("a", b"k", b"1").await.unwrap();
        store.put("b", b"k", b"2").await.unwrap();

        assert_eq!(store.get("a", b"k").await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get("b", b"k").await.unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.scan("a").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_if_absent() {
        let store = MemoryStore::new();
        assert!(store.insert("a", b"k", b"1").await.unwrap());
        assert!(!store.insert("a", b"k", b"2").await.unwrap());
        assert_eq!(store.get("a", b"k").await.unwrap(), Some(b"1".to_vec()));

        assert!(store.delete("a", b"k").await.unwrap());
        assert!(!store.delete("a", b"k").await.unwrap());
    }
}
