//! Object Store Interface: the abstraction every stage uses to read source
//! documents and persist pipeline artifacts.

pub mod cloud;
pub mod local;
pub mod traits;

pub use cloud::CloudObjectStore;
pub use local::LocalObjectStore;
pub use traits::{ObjectStore, read_json, write_json};

use std::sync::Arc;

use crate::config::AuditConfig;
use crate::error::Result;

/// Constructs the `ObjectStore` backend selected by `config.object_store_url`.
/// `file://` URLs (and bare paths) use [`LocalObjectStore`]; anything else is
/// handed to `object_store::parse_url` and wrapped in [`CloudObjectStore`].
pub async fn from_config(config: &AuditConfig) -> Result<Arc<dyn ObjectStore>> {
    let url = &config.object_store_url;
    if url.starts_with("file://") || !url.contains("://") {
        let path = local::path_from_url(url);
        let store = LocalObjectStore::new(path).await?;
        return Ok(Arc::new(store));
    }
    let parsed_url = url::Url::parse(url)
        .map_err(|e| crate::error::ConfigError::Invalid {
            field: "object_store_url".to_string(),
            reason: e.to_string(),
        })?;
    let (inner, _path) = object_store::parse_url(&parsed_url)
        .map_err(|e| crate::error::ObjectStoreError::Fatal(e.to_string()))?;
    Ok(Arc::new(CloudObjectStore::new(inner)))
}
