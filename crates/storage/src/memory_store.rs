use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{check_key, StateStore, StorageError, StorageResult};

/// In-memory store, mainly for tests and ephemeral nodes
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn put(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        check_key(key)?;
        self.data.write().await.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.data
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::KeyNotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        match self.data.write().await.remove(key) {
            Some(_) => Ok(()),
            None => Err(StorageError::KeyNotFound(key.to_string())),
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.data.read().await.contains_key(key))
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let prefix = prefix.trim_end_matches('/');
        let data = self.data.read().await;
        Ok(data
            .keys()
            .filter(|k| {
                prefix.is_empty()
                    || k.as_str() == prefix
                    || (k.starts_with(prefix) && k[prefix.len()..].starts_with('/'))
            })
            .cloned()
            .collect())
    }

    fn base_path(&self) -> Option<PathBuf> {
        None
    }
}
