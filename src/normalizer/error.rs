//! Decode error types

use thiserror::Error;

/// Why an inbound broker payload was rejected
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Payload is not JSON, or does not match the topic's schema
    /// (including missing or non-numeric measurement fields)
    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A required identifier is absent or blank
    #[error("Missing field: {0}")]
    MissingField(&'static str),
}

/// Result type alias for decoding
pub type DecodeResult<T> = Result<T, DecodeError>;
