//! Error types for nutricache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in nutricache
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record or response (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // =========================================================================
    // Provider Errors
    // =========================================================================
    /// HTTP transport error (connect, timeout, body read)
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a status we cannot serve
    #[error("{status} {reason}")]
    Upstream { status: u16, reason: String },

    /// Provider response could not be understood
    #[error("Unexpected provider response: {0}")]
    UnexpectedResponse(String),

    // =========================================================================
    // Request Errors
    // =========================================================================
    /// Malformed client command
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Serialized response does not fit the connection's output buffer
    #[error("Result of {size} bytes exceeds output buffer capacity of {capacity} bytes")]
    ResultTooLarge { size: usize, capacity: usize },

    // =========================================================================
    // Runtime Errors
    // =========================================================================
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error was caused by the client rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidRequest(_))
    }
}
