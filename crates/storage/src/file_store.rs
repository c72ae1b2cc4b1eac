use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::trace;

use crate::{check_key, StateStore, StorageError, StorageResult};

const TMP_SUFFIX: &str = ".tmp";

/// A store that keeps one file per key under a root directory.
///
/// Writes go to a sibling temporary file first and are renamed into place, so
/// a reader never observes a half-written document.
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn full_path(&self, key: &str) -> StorageResult<PathBuf> {
        check_key(key)?;
        Ok(self.base_path.join(key))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.base_path).ok()?;
        let parts: Vec<&str> = relative.iter().map(|p| p.to_str()).collect::<Option<_>>()?;
        Some(parts.join("/"))
    }
}

#[async_trait]
impl StateStore for FileStore {
    async fn put(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        let path = self.full_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::IoError(format!("Failed to create directory: {}", e)))?;
        }

        let tmp = PathBuf::from(format!("{}{}", path.display(), TMP_SUFFIX));
        tokio::fs::write(&tmp, data)
            .await
            .map_err(|e| StorageError::IoError(format!("Failed to write data: {}", e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StorageError::IoError(format!("Failed to move data into place: {}", e)))?;

        trace!(key, bytes = data.len(), "stored");
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.full_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::KeyNotFound(key.to_string()))
            }
            Err(e) => Err(StorageError::IoError(format!("Failed to read data: {}", e))),
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.full_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::KeyNotFound(key.to_string()))
            }
            Err(e) => Err(StorageError::IoError(format!("Failed to delete file: {}", e))),
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.full_path(key)?;
        Ok(tokio::fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false))
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let root = if prefix.is_empty() {
            self.base_path.clone()
        } else {
            self.full_path(prefix.trim_end_matches('/'))?
        };

        let mut keys = Vec::new();
        let mut pending = vec![root];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(StorageError::IoError(format!("Failed to read directory: {}", e)))
                }
            };
            while let Some(entry) = entries.next_entry().await.map_err(|e| {
                StorageError::IoError(format!("Failed to read directory entry: {}", e))
            })? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if !path.to_string_lossy().ends_with(TMP_SUFFIX) {
                    if let Some(key) = self.key_for(&path) {
                        keys.push(key);
                    }
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn base_path(&self) -> Option<PathBuf> {
        Some(self.base_path.clone())
    }
}
