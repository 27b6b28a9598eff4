use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing process-level setting: credentials, paths, logging.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Section definitions that cannot be synced as written.
    #[error("Invalid section configuration: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
