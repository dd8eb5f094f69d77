//! Error types and Result aliases for Semdex.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use thiserror::Error;

/// Result type alias using Semdex's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Semdex operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error. Fatal at startup; never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// Index backend error (embedding or storage call failed).
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// File watching error.
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// A scan was requested while another scan is in flight.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The service cannot answer in its current state.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Index backend errors.
#[derive(Error, Debug)]
pub enum BackendError {
    /// `SQLite` database error.
    #[error("database error: {0}")]
    Database(String),

    /// Vector table operation error.
    #[error("vector error: {0}")]
    Vector(String),

    /// Embedding generation error.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),
}

/// File watcher errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to watch path.
    #[error("failed to watch path '{path}': {reason}")]
    WatchFailed { path: String, reason: String },

    /// Failed to process a file event.
    #[error("failed to process file '{path}': {reason}")]
    ProcessFailed { path: String, reason: String },
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a conflict error.
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create an unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
