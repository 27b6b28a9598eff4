use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An update addressed a catalog row that does not exist.
    #[error("Catalog entry {id} not found")]
    EntryNotFound { id: String },

    /// Input rejected before it reached the database.
    #[error("Invalid {field}: {message}")]
    InvalidInput { field: String, message: String },

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("Metadata is not valid JSON: {0}")]
    Metadata(#[from] serde_json::Error),
}

impl CatalogError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        CatalogError::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
