use bridge_traits::error::BridgeError;
use core_catalog::CatalogError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Login rejected or session no longer accepted. Aborts the run.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The configured folder reference could not be located. Aborts the section.
    #[error("Could not resolve folder reference '{reference}'")]
    Resolution { reference: String },

    #[error("Not found on remote host: {0}")]
    NotFound(String),

    #[error("Transient remote failure: {0}")]
    Transient(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

impl SyncError {
    /// Whether retrying the same operation later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Upload(_))
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

impl From<BridgeError> for SyncError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::Unauthorized(msg) => Self::Auth(msg),
            BridgeError::NotFound(what) => Self::NotFound(what),
            other => Self::Transient(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
