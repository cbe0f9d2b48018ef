//! Error types for the gate.

use thiserror::Error;

/// Errors that can occur while building or operating a gate.
///
/// `SequenceGate::handle` itself never fails; these cover setup.
#[derive(Debug, Error)]
pub enum GateError {
    /// Configuration rejected by [`GateConfig::validate`](crate::GateConfig::validate).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for gate operations.
pub type Result<T> = std::result::Result<T, GateError>;
