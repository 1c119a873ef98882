//! The Object Store Interface: the pipeline's sole durable shared resource.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ObjectStoreError, Result};

/// Capability contract every pipeline stage and component uses to read and
/// write durable artifacts. Implementors must be safe to share across
/// concurrently running stages; no two stages ever write to overlapping
/// keys, so no locking is required inside an implementation.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Lists all keys under `prefix`, non-recursively joined with `/`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Reads the raw bytes stored at `key`.
    async fn read(&self, key: &str) -> Result<Vec<u8>>;

    /// Writes `bytes` to `key`, overwriting any existing content.
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Returns true if `key` exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Writes `bytes` to `key` only if no writer has done so already.
    /// Returns [`ObjectStoreError::WriteConflict`] if another writer won
    /// the race; this is the serialization point the Document Finder's
    /// idempotent-initialization guarantee relies on.
    async fn atomic_upload(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Moves `key` to `archive_key`, used to retire superseded artifacts
    /// without losing them.
    async fn archive(&self, key: &str, archive_key: &str) -> Result<()>;

    /// Deletes every object whose key starts with `prefix`.
    async fn delete_prefix(&self, prefix: &str) -> Result<()>;


    /// Convenience: reads and deserializes a JSON document. Excluded from
    /// the trait's object-safe surface (`Self: Sized`) since it is generic;
    /// callers needing this through a `dyn ObjectStore` use the free
    /// functions [`read_json`] / [`write_json`] instead.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<T>
    where
        Self: Sized,
    {
        read_json(self, key).await
    }

    /// Convenience: serializes and writes a JSON document. See
    /// [`ObjectStore::read_json`] for why this requires `Self: Sized`.
    async fn write_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<()>
    where
        Self: Sized,
    {
        write_json(self, key, value).await
    }
}

/// Reads and deserializes a JSON document from any `ObjectStore`,
/// including through a `&dyn ObjectStore`.
pub async fn read_json<T: DeserializeOwned>(store: &(impl ObjectStore + ?Sized), key: &str) -> Result<T> {
    let bytes = store.read(key).await?;
    serde_json::from_slice(&bytes).map_err(|e| ObjectStoreError::Serialization(e.to_string()).into())
}

/// Serializes and writes a JSON document to any `ObjectStore`, including
/// through a `&dyn ObjectStore`.
pub async fn write_json<T: Serialize + Sync>(
    store: &(impl ObjectStore + ?Sized),
    key: &str,
    value: &T,
) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| ObjectStoreError::Serialization(e.to_string()))?;
    store.write(key, &bytes).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MemoryStore {
        objects: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl MemoryStore {
        fn new() -> Self {
            Self {
                objects: Mutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn list(&self, prefix: &str) -> Result<Vec<String>> {
            Ok(self
                .objects
                .lock()
                .expect("lock")
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect())
        }

        async fn read(&self, key: &str) -> Result<Vec<u8>> {
            self.objects
                .lock()
                .expect("lock")
                .get(key)
                .cloned()
                .ok_or_else(|| ObjectStoreError::NotFound { key: key.to_string() }.into())
        }

        async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
            self.objects
                .lock()
                .expect("lock")
                .insert(key.to_string(), bytes.to_vec());
            Ok(())
        }

        async fn exists(&self, key: &str) -> Result<bool> {
            Ok(self.objects.lock().expect("lock").contains_key(key))
        }

        async fn atomic_upload(&self, key: &str, bytes: &[u8]) -> Result<()> {
            let mut objects = self.objects.lock().expect("lock");
            if objects.contains_key(key) {
                return Err(ObjectStoreError::WriteConflict { key: key.to_string() }.into());
            }
            objects.insert(key.to_string(), bytes.to_vec());
            Ok(())
        }

        async fn archive(&self, key: &str, archive_key: &str) -> Result<()> {
            let mut objects = self.objects.lock().expect("lock");
            if let Some(bytes) = objects.remove(key) {
                objects.insert(archive_key.to_string(), bytes);
            }
            Ok(())
        }

        async fn delete_prefix(&self, prefix: &str) -> Result<()> {
            self.objects
                .lock()
                .expect("lock")
                .retain(|k, _| !k.starts_with(prefix));
            Ok(())
        }
    }

    #[tokio::test]
    async fn atomic_upload_rejects_second_writer() {
        let store = MemoryStore::new();
        store.atomic_upload("k", b"first").await.unwrap();
        let err = store.atomic_upload("k", b"second").await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::ObjectStore(ObjectStoreError::WriteConflict { .. })
        ));
    }

    #[tokio::test]
    async fn read_json_round_trips_through_trait_object() {
        let store: Box<dyn ObjectStore> = Box::new(MemoryStore::new());
        write_json(&*store, "doc.json", &serde_json::json!({"a": 1})).await.unwrap();
        let value: serde_json::Value = read_json(&*store, "doc.json").await.unwrap();
        assert_eq!(value["a"], 1);
    }
}
