use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// Credentials rejected or session no longer accepted by the remote side.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BridgeError::NotFound(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, BridgeError::Unauthorized(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
