//! Shared primitives for all Rust crates in Leasehold.

#![forbid(unsafe_code)]

/// Per-request metadata shared across services.
pub mod request;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use request::RequestContext;

/// Result type used across Leasehold crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant. Safe to retry after correcting input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state, including terminal
    /// approval states and lost compare-and-set races.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Actor is blocked by a permission or scope check.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A caller-supplied deadline elapsed before the store answered.
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns whether retrying with the same input can succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DeadlineExceeded(_) | Self::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::{AppError, NonEmptyString};

    #[test]
    fn non_empty_string_rejects_whitespace() {
        let result = NonEmptyString::new("   ");
        assert!(result.is_err());
    }

    #[test]
    fn non_empty_string_keeps_original_value() {
        let value = NonEmptyString::new(" Roof repair ");
        assert_eq!(
            value.map(String::from).unwrap_or_default(),
            " Roof repair ".to_owned()
        );
    }

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(AppError::DeadlineExceeded("store".to_owned()).is_retryable());
        assert!(!AppError::Forbidden("nope".to_owned()).is_retryable());
        assert!(!AppError::Conflict("already decided".to_owned()).is_retryable());
    }
}
