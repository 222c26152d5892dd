//! Error types for mosaic-core

use thiserror::Error;

/// Result type alias using mosaic-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mosaic-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// No valid credential was available for the object store
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Transient transport failure talking to the object store
    #[error("Network error: {0}")]
    Network(String),

    /// Branch pointer moved between observation and update
    #[error("Branch moved during commit: {0}")]
    RefConflict(String),

    /// Branch or object absent from the store
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed stored JSON
    #[error("Failed to parse stored JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Date string does not match `YYYY-MM-DD`
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// IO error from the local cache
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input or configuration
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
