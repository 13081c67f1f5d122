//! Service error types.

use thiserror::Error;

use crate::security::SecurityError;
use crate::storage::StoreError;

/// Errors returned by `MonitorService` operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Authentication, authorization, rate limit or cipher failure.
    #[error(transparent)]
    Security(#[from] SecurityError),

    /// The unit of work could not be committed and was rolled back.
    #[error("persistence failure: {0}")]
    Store(#[from] StoreError),

    /// Entity addressed by the caller does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Uniqueness constraint violated.
    #[error("{0}")]
    Conflict(String),

    /// Request payload failed validation.
    #[error("{0}")]
    Validation(String),
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
