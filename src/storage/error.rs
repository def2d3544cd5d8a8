//! Storage error types

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// Persisted state exists but cannot be trusted. Never repaired automatically.
    #[error("Corrupt state in {path}: {reason}")]
    CorruptState { path: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to persist {path}: {source}")]
    Persist {
        path: String,
        source: tempfile::PersistError,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
