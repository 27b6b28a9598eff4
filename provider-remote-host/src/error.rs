//! Error types for the remote host provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteHostError {
    /// Credentials rejected or session token no longer accepted
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Remote host API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Not found on remote host: {slug}")]
    NotFound { slug: String },

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, RemoteHostError>;

impl From<RemoteHostError> for BridgeError {
    fn from(error: RemoteHostError) -> Self {
        match error {
            RemoteHostError::AuthenticationFailed(msg) => BridgeError::Unauthorized(msg),
            RemoteHostError::NotFound { slug } => BridgeError::NotFound(slug),
            RemoteHostError::ApiError {
                status_code,
                message,
            } => BridgeError::OperationFailed(format!(
                "API error (status {}): {}",
                status_code, message
            )),
            RemoteHostError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            RemoteHostError::BridgeError(e) => e,
        }
    }
}
