//! Error types and Result aliases for dirindexer.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using dirindexer's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for dirindexer operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Include and exclude extension lists were both supplied.
    #[error("invalid filter configuration: {0}")]
    FilterConfig(String),

    /// Scan root is missing or not a directory.
    #[error("not found: '{}' does not exist or is not a directory", path.display())]
    NotFound { path: PathBuf },

    /// A file could not be read between scan and load.
    #[error("failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Index engine error.
    #[error("index error: {0}")]
    Storage(#[from] StorageError),

    /// File watching error.
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Index engine errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// `SQLite` database error.
    #[error("database error: {0}")]
    Database(String),

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Malformed or failing search query.
    #[error("query error: {0}")]
    Query(String),
}

/// File watcher errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to subscribe to notifications for a path.
    #[error("failed to watch path '{path}': {reason}")]
    WatchFailed { path: String, reason: String },
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a filter configuration error.
    pub fn filter_config(msg: impl Into<String>) -> Self {
        Self::FilterConfig(msg.into())
    }

    /// Create a not-found error for a scan root.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a read error for a file.
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error only affects a single file and the enclosing run
    /// may continue.
    #[must_use]
    pub const fn is_per_file(&self) -> bool {
        matches!(self, Self::Read { .. })
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}
