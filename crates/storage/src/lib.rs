//! Snapshot storage for the Portal platform
//!
//! The engine is the transition-rule layer; durable storage belongs to an
//! external substrate. This crate is the seam to it: a flat key/value
//! `StateStore` with a JSON layer on top, plus a file-backed and an
//! in-memory implementation.

use std::path::PathBuf;

use async_trait::async_trait;
use portal_common::ErrorKind;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

mod file_store;
mod memory_store;

pub use file_store::FileStore;
pub use memory_store::MemoryStore;

/// Storage-related errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::KeyNotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::Storage,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError(err.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Byte-oriented key/value store. Keys are `/`-separated paths.
#[async_trait]
pub trait StateStore: Send + Sync + 'static {
    async fn put(&self, key: &str, data: &[u8]) -> StorageResult<()>;

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    async fn delete(&self, key: &str) -> StorageResult<()>;

    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Keys directly or transitively under `prefix`, sorted
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Root directory for file-backed stores
    fn base_path(&self) -> Option<PathBuf>;
}

/// JSON helpers available on every [`StateStore`]
#[async_trait]
pub trait JsonStore: StateStore {
    async fn put_json<T: Serialize + Send + Sync>(&self, key: &str, value: &T) -> StorageResult<()> {
        let json_data = serde_json::to_vec_pretty(value)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        self.put(key, &json_data).await
    }

    async fn get_json<T: DeserializeOwned + Send>(&self, key: &str) -> StorageResult<T> {
        let data = self.get(key).await?;
        serde_json::from_slice(&data).map_err(|e| StorageError::DeserializationError(e.to_string()))
    }

    /// Like `get_json`, mapping a missing key to `None`
    async fn try_get_json<T: DeserializeOwned + Send>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.get_json(key).await {
            Ok(value) => Ok(Some(value)),
            Err(StorageError::KeyNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl<T: StateStore + ?Sized> JsonStore for T {}

/// Reject keys that could escape a file store's root
pub(crate) fn check_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..")
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
