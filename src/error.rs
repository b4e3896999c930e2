//! Error types for Httptrap

use std::io;
use thiserror::Error;

/// Result type for Httptrap operations
pub type Result<T> = std::result::Result<T, HttptrapError>;

/// Errors that can occur in Httptrap
#[derive(Debug, Error)]
pub enum HttptrapError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Request body could not be read or decoded
    #[error("Failed to read request body: {0}")]
    BodyRead(String),

    /// Malformed request component (query string, header value)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A capture slot was written twice (Arrival Counter bypassed)
    #[error("Capture slot {index} already holds a request")]
    SlotAlreadyFilled {
        /// Index of the slot that was written twice
        index: usize,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}
