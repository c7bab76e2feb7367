//! Common error types for labtrack

use thiserror::Error;

/// Common result type for labtrack operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the labtrack crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Stored schema does not match the version this build understands
    #[error("Database schema version {found} does not match expected version {expected}")]
    SchemaVersion { found: i32, expected: i32 },

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),
}
