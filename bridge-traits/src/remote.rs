//! Remote File Host Abstraction
//!
//! Contract for the third-party file host whose folder tree is mirrored into
//! the catalog. Implementations normalize the host's response shapes into the
//! typed values below before returning them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Authenticated session returned by [`RemoteHost::login`].
///
/// Threaded explicitly into every call. The token is never refreshed; once the
/// host stops accepting it, calls fail with `BridgeError::Unauthorized`.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("token", &"<redacted>").finish()
    }
}

/// One child of a remote folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub slug: String,
    pub name: String,
    pub is_folder: bool,
    pub size: Option<u64>,
}

/// Detailed information about a remote file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteFileInfo {
    pub name: String,
    pub extension: Option<String>,
    pub size: Option<u64>,
    pub duration_seconds: Option<f64>,
    pub mime_type: Option<String>,
    /// Time-limited link to a thumbnail image
    pub thumbnail_url: Option<String>,
    /// Time-limited link to a short video preview
    pub video_preview_url: Option<String>,
    pub parent_folder_slug: Option<String>,
}

/// Remote file host trait
///
/// # Errors
///
/// - `BridgeError::Unauthorized` - bad credentials or rejected session
/// - `BridgeError::NotFound` - the slug does not exist (HTTP 404)
/// - `BridgeError::OperationFailed` - any other failure, treated as transient
///
/// # Example
///
/// ```ignore
/// let session = host.login().await?;
/// let root = host.list_folder(&session, None).await?;
/// for entry in root.iter().filter(|e| !e.is_folder) {
///     let info = host.get_file_detail(&session, &entry.slug).await?;
/// }
/// ```
#[async_trait]
pub trait RemoteHost: Send + Sync {
    /// Authenticate with the configured credentials.
    async fn login(&self) -> Result<Session>;

    /// List the children of a folder; `None` lists the account root.
    async fn list_folder(&self, session: &Session, slug: Option<&str>) -> Result<Vec<RemoteEntry>>;

    /// Fetch file details, including fresh preview URLs.
    async fn get_file_detail(&self, session: &Session, slug: &str) -> Result<RemoteFileInfo>;
}
