//! Security error taxonomy.

use thiserror::Error;

/// Errors raised by the security core.
///
/// Display strings are categorical on purpose: they are what callers see.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityError {
    /// Token expiry is at or before the current time.
    #[error("token has expired")]
    ExpiredToken,

    /// Signature mismatch or unparseable token.
    #[error("invalid token")]
    MalformedOrForgedToken,

    /// Principal role is not in the allowed set.
    #[error("insufficient permissions")]
    Forbidden,

    /// Sliding window for the principal is full.
    #[error("rate limit exceeded")]
    RateLimitExceeded {
        /// Seconds until the oldest admitted call leaves the window.
        retry_after_secs: u64,
    },

    /// Sensitive field could not be encrypted.
    #[error("encryption failed")]
    EncryptionFailure,

    /// Unknown principal or wrong password.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// Key material has the wrong shape.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// Password could not be hashed.
    #[error("password hashing failed")]
    PasswordHashing,

    /// Token could not be signed.
    #[error("token signing failed")]
    TokenSigning,
}

/// Result type for security operations.
pub type SecurityResult<T> = Result<T, SecurityError>;
