//! Storage errors, split by whether a caller may safely retry them.

use thiserror::Error;

/// Errors raised by a [`crate::RuleStore`] or [`crate::EventSink`]
/// implementation.
///
/// `Transient` is safe to retry with backoff; `Constraint` and `NotFound`
/// are not.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("transient store error: {0}")]
    Transient(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether a caller may retry this error, i.e. it is a transient
    /// transport or store failure rather than a constraint violation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transient(_) | StoreError::Unavailable(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
