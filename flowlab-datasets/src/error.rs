//! Dataset and storage errors.

use thiserror::Error;

/// Errors raised by the dataset store and blob stores.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The underlying blob store failed.
    #[error("Store error: {0}")]
    Store(String),

    /// A stored collection could not be decoded.
    #[error("Corrupt collection under key '{key}': {message}")]
    Corrupt {
        /// Store key.
        key: String,
        /// Decoder message.
        message: String,
    },

    /// Dataset not found.
    #[error("Dataset not found: {0}")]
    NotFound(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DatasetError {
    /// Create a store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a corrupt-collection error.
    pub fn corrupt(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Result type for dataset operations.
pub type DatasetResult<T> = Result<T, DatasetError>;
