//! Storage error types for briq-core

use thiserror::Error;

/// Failures writing or reading a persisted slot.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backend refused the write for lack of space
    #[error("Storage quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded { needed: usize, available: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Anything else a backend wants to report
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            Self::Io(_) => "STORAGE_IO",
            Self::Sqlite(_) => "STORAGE_SQLITE",
            Self::Serialization(_) => "STORAGE_SERIALIZATION",
            Self::Backend(_) => "STORAGE_BACKEND",
        }
    }
}
