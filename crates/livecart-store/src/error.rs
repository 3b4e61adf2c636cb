use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The requested record does not exist.
    #[error("{collection} record not found: {id}")]
    NotFound { collection: String, id: String },

    /// A stored body or an incoming record could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A filter field was not usable.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// A record or patch did not have the shape of a document.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
