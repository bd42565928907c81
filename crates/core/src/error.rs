//! Validation errors for values that enter the system from outside.

use thiserror::Error;

/// Result type for constructors that validate their input.
pub type DomainResult<T> = Result<T, DomainError>;

/// Failure to accept an externally supplied value.
///
/// Authorization failures are not errors at this layer: the gate expresses
/// them as decisions, never as `Err`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed email).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
