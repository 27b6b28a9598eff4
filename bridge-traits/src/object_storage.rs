//! Object Storage Abstraction
//!
//! Durable storage for mirrored preview assets. Keys returned by `upload`
//! never expire and are what the catalog stores as permanent media references.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `data` under `key` and return the permanent reference.
    ///
    /// Uploading the same key twice overwrites the previous object.
    async fn upload(&self, data: Bytes, key: &str, content_type: Option<&str>) -> Result<String>;
}
