//! Error types for the host binary

use thiserror::Error;

/// Host error type
#[derive(Error, Debug)]
pub enum HostError {
    /// Reading or writing the line protocol failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The frame writer stopped unexpectedly
    #[error("Writer task failed: {0}")]
    WriterTask(String),
}

/// Result type for host operations
pub type HostResult<T> = Result<T, HostError>;

impl From<tokio::task::JoinError> for HostError {
    fn from(err: tokio::task::JoinError) -> Self {
        HostError::WriterTask(err.to_string())
    }
}
