//! Error types for the local store.

use fleetsync_engine::SyncError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the local store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A file did not contain the expected JSON.
    #[error("invalid JSON in {path}: {source}")]
    Json {
        /// File being read or written.
        path: PathBuf,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },

    /// Another process holds the data directory.
    #[error("data directory is locked by another process: {0}")]
    Locked(PathBuf),

    /// The data directory path exists but is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
}

impl StoreError {
    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        StoreError::Json {
            path: path.into(),
            source,
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Json { .. } => SyncError::Protocol(err.to_string()),
            other => SyncError::Network(other.to_string()),
        }
    }
}
