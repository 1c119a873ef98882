//! Filesystem-backed `ObjectStore`, used for local runs and tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::error::{ObjectStoreError, Result};

use super::traits::ObjectStore;

/// An `ObjectStore` rooted at a directory on the local filesystem. Keys map
/// directly to relative paths under the root.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Creates a store rooted at `root`, creating the directory if absent.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = self.path_for(prefix);
        let mut keys = Vec::new();
        if !dir.exists() {
            return Ok(keys);
        }
        let mut stack = vec![dir.clone()];
        while let Some(current) = stack.pop() {
            let mut entries = fs::read_dir(&current).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if let Ok(rel) = path.strip_prefix(&self.root) {
                    if let Some(s) = rel.to_str() {
                        keys.push(s.replace(std::path::MAIN_SEPARATOR, "/"));
                    }
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key);
        fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ObjectStoreError::NotFound {
                    key: key.to_string(),
                }
                .into()
            } else {
                ObjectStoreError::Transient(e.to_string()).into()
            }
        })
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.path_for(key).exists())
    }

    async fn atomic_upload(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        use tokio::io::AsyncWriteExt;
        match options.open(&path).await {
            Ok(mut file) => {
                file.write_all(bytes).await?;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(ObjectStoreError::WriteConflict {
                    key: key.to_string(),
                }
                .into())
            }
            Err(e) => Err(ObjectStoreError::Fatal(e.to_string()).into()),
        }
    }

    async fn archive(&self, key: &str, archive_key: &str) -> Result<()> {
        let from = self.path_for(key);
        let to = self.path_for(archive_key);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(&from, &to).await?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        let dir = self.path_for(prefix);
        if dir.is_dir() {
            fs::remove_dir_all(&dir).await?;
        } else if dir.is_file() {
            fs::remove_file(&dir).await?;
        }
        Ok(())
    }
}

/// Resolves a `file://`-style URL to a local path, used by
/// `AuditConfig::object_store_url` when constructing a `LocalObjectStore`.
#[must_use]
pub fn path_from_url(url: &str) -> PathBuf {
    Path::new(url.strip_prefix("file://").unwrap_or(url)).to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalObjectStore::new(dir.path()).await.unwrap();
        store.write("a/b.json", b"hello").await.unwrap();
        assert_eq!(store.read("a/b.json").await.unwrap(), b"hello");
        assert!(store.exists("a/b.json").await.unwrap());
    }

    #[tokio::test]
    async fn atomic_upload_rejects_duplicate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalObjectStore::new(dir.path()).await.unwrap();
        store.atomic_upload("k.json", b"first").await.unwrap();
        let err = store.atomic_upload("k.json", b"second").await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::ObjectStore(ObjectStoreError::WriteConflict { .. })
        ));
    }

    #[tokio::test]
    async fn list_finds_nested_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalObjectStore::new(dir.path()).await.unwrap();
        store.write("results/chapter1.json", b"{}").await.unwrap();
        store.write("results/chapter3.json", b"{}").await.unwrap();
        let keys = store.list("results").await.unwrap();
        assert_eq!(keys.len(), 2);
    }

    #[tokio::test]
    async fn read_missing_key_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalObjectStore::new(dir.path()).await.unwrap();
        let err = store.read("missing.json").await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::ObjectStore(ObjectStoreError::NotFound { .. })
        ));
    }
}
