//! Errors the engine can surface to callers.
//!
//! The taxonomy mirrors how operations fail:
//!
//! - [`Validation`] for malformed or inconsistent input; never retried.
//! - [`NotFound`] when a referenced record is missing.
//! - [`Unauthorized`] for ownership/scope violations.
//! - [`RangeExhausted`] when a sequence-code range has no room left.
//! - [`Conflict`] for duplicate keys that survived the single allocation retry.
//! - [`Consistency`] when a compensating rollback itself failed and the
//!   stored state needs manual reconciliation.
//!
//! [`Validation`]: EngineError::Validation
//! [`NotFound`]: EngineError::NotFound
//! [`Unauthorized`]: EngineError::Unauthorized
//! [`RangeExhausted`]: EngineError::RangeExhausted
//! [`Conflict`]: EngineError::Conflict
//! [`Consistency`]: EngineError::Consistency
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("Not allowed: {0}")]
    Unauthorized(String),
    #[error("Sequence range exhausted for {0}")]
    RangeExhausted(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Consistency failure: {0}")]
    Consistency(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::Unauthorized(a), Self::Unauthorized(b)) => a == b,
            (Self::RangeExhausted(a), Self::RangeExhausted(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::Consistency(a), Self::Consistency(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

impl EngineError {
    /// True for duplicate-key violations, the only store error class the
    /// classifier retries (once) during sequence-code allocation.
    pub(crate) fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database(err) => {
                let msg = err.to_string();
                msg.contains("UNIQUE constraint failed") || msg.contains("duplicate key")
            }
            _ => false,
        }
    }
}
