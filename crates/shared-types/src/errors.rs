//! # Error Types
//!
//! Errors raised while parsing shared types from their textual forms.

use thiserror::Error;

/// Errors produced when decoding identifiers and hashes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// Input was not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// Decoded value had the wrong length.
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
