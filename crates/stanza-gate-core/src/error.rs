//! Error types for the stanza gate core.

use thiserror::Error;

/// Errors raised while constructing core values from untrusted input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid principal: {0}")]
    InvalidPrincipal(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
