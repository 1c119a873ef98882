//! `ObjectStore` implementation backed by the `object_store` crate, giving
//! S3/GCS/Azure/HTTP backends without hand-rolling any wire protocol.

use async_trait::async_trait;
use bytes::Bytes;
use object_store::path::Path as StorePath;
use object_store::{ObjectStore as ObjectStoreCrate, PutMode, PutOptions};

use crate::error::{ObjectStoreError, Result};

use super::traits::ObjectStore;

/// Wraps any `object_store::ObjectStore` backend behind the pipeline's
/// `ObjectStore` trait.
pub struct CloudObjectStore {
    inner: Box<dyn ObjectStoreCrate>,
}

impl CloudObjectStore {
    /// Wraps an already-constructed backend (built via
    /// `object_store::parse_url` or a provider-specific builder).
    #[must_use]
    pub fn new(inner: Box<dyn ObjectStoreCrate>) -> Self {
        Self { inner }
    }
}

fn store_path(key: &str) -> StorePath {
    StorePath::from(key)
}

#[async_trait]
impl ObjectStore for CloudObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        use futures_util::StreamExt;
        let prefix_path = store_path(prefix);
        let mut stream = self.inner.list(Some(&prefix_path));
        let mut keys = Vec::new();
        while let Some(meta) = stream.next().await {
            let meta = meta.map_err(ObjectStoreError::from)?;
            keys.push(meta.location.to_string());
        }
        keys.sort();
        Ok(keys)
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let result = self
            .inner
            .get(&store_path(key))
            .await
            .map_err(ObjectStoreError::from)?;
        let bytes = result.bytes().await.map_err(ObjectStoreError::from)?;
        Ok(bytes.to_vec())
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.inner
            .put(&store_path(key), Bytes::copy_from_slice(bytes).into())
            .await
            .map_err(ObjectStoreError::from)?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        match self.inner.head(&store_path(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(ObjectStoreError::from(e).into()),
        }
    }

    async fn atomic_upload(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let options = PutOptions {
            mode: PutMode::Create,
            ..Default::default()
        };
        match self
            .inner
            .put_opts(&store_path(key), Bytes::copy_from_slice(bytes).into(), options)
            .await
        {
            Ok(_) => Ok(()),
            Err(object_store::Error::AlreadyExists { .. }) => Err(ObjectStoreError::WriteConflict {
                key: key.to_string(),
            }
            .into()),
            Err(e) => Err(ObjectStoreError::from(e).into()),
        }
    }

    async fn archive(&self, key: &str, archive_key: &str) -> Result<()> {
        self.inner
            .rename(&store_path(key), &store_path(archive_key))
            .await
            .map_err(ObjectStoreError::from)?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        use futures_util::StreamExt;
        let prefix_path = store_path(prefix);
        let mut stream = self.inner.list(Some(&prefix_path));
        while let Some(meta) = stream.next().await {
            let meta = meta.map_err(ObjectStoreError::from)?;
            self.inner
                .delete(&meta.location)
                .await
                .map_err(ObjectStoreError::from)?;
        }
        Ok(())
    }
}
