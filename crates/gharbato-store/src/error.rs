use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached. Transient; the caller may retry.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Security rules reject the read, write or listener.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A path or path segment is not addressable.
    #[error("Invalid path `{path}`: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// The store handle was shut down.
    #[error("Store closed")]
    Closed,

    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),
}

impl StoreError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
