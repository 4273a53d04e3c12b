//! Domain error model.
//!
//! Only deterministic business failures live here: a quantity that fails
//! validation, a FIFO breach, a document submitted twice. Infrastructure
//! failures (store, bus) have their own error types in the infra crate.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input: blank name, non-positive quantity, bad date range.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A business rule would be broken: issuing more than a lot holds,
    /// selling around an older batch, clearing an unsubmitted shipment.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Identifier failed to parse.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The aggregate stream exists but has never been created.
    #[error("not found")]
    NotFound,

    /// Duplicate creation or a state the document is already in.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Authorization failure at the domain boundary.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
