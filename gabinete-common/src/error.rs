//! Common error types for gabinete

use thiserror::Error;

use crate::spark::SectionName;

/// Common result type for gabinete operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the gabinete crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error for stored sub-fields
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Submission rejected because required fields are blank
    #[error("Missing required fields: {}", missing.join(", "))]
    Validation { missing: Vec<String> },

    /// A checkpoint section failed its save precondition
    #[error("{section} not saved: {message}")]
    Section {
        section: SectionName,
        message: String,
    },

    /// Media decode or encode failure
    #[error("Media error: {0}")]
    Media(String),

    /// CSV or archive export failure
    #[error("Export error: {0}")]
    Export(String),

    /// Stored data that cannot be decoded
    #[error("Internal error: {0}")]
    Internal(String),
}
