use thiserror::Error;

#[derive(Debug, Error)]
pub enum LivecartError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid timestamp: {0}")]
    Timestamp(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LivecartError {
    /// Short error code string, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            LivecartError::Config(_) => "CONFIG_ERROR",
            LivecartError::Serialization(_) => "SERIALIZATION_ERROR",
            LivecartError::Io(_) => "IO_ERROR",
            LivecartError::Timestamp(_) => "TIMESTAMP_ERROR",
            LivecartError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, LivecartError>;
