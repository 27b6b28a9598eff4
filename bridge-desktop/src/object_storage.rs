//! Object Storage Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    object_storage::ObjectStorage,
};
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Directory-backed object storage
///
/// Objects are written to `<root>/<key>`. The returned permanent reference is
/// the key itself, so the catalog stays independent of where the root lives.
pub struct FsObjectStorage {
    root: PathBuf,
}

impl FsObjectStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store objects under the platform data directory
    pub fn with_default_root() -> Self {
        let root = dirs::data_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".local")
                    .join("share")
            })
            .join("content-mirror")
            .join("objects");

        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a path under the root, rejecting traversal.
    fn object_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));

        if !is_plain {
            return Err(BridgeError::OperationFailed(format!(
                "Invalid object key: {}",
                key
            )));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for FsObjectStorage {
    async fn upload(&self, data: Bytes, key: &str, content_type: Option<&str>) -> Result<String> {
        let path = self.object_path(key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(&path, data.as_ref()).await?;
        debug!(
            key,
            path = ?path,
            size = data.len(),
            content_type = content_type.unwrap_or("application/octet-stream"),
            "Stored object"
        );

        Ok(key.to_string())
    }
}
