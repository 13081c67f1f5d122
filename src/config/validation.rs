//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: `MonitorConfig → Result<(), Vec<ValidationError>>`
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;

use crate::config::schema::MonitorConfig;
use crate::security::rate_limit::MAX_WINDOW_SECS;

/// Minimum accepted length of the token signing secret.
pub const MIN_SECRET_LEN: usize = 32;

/// One semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("auth.jwt_secret must be at least {MIN_SECRET_LEN} bytes")]
    WeakSecret,

    #[error("auth.token_ttl_secs must be greater than zero")]
    ZeroTokenTtl,

    #[error("encryption.key must be base64 of exactly 32 bytes")]
    BadEncryptionKey,

    #[error("rate_limit.window_secs must be greater than zero")]
    ZeroWindow,

    #[error("rate_limit.window_secs must be at most {MAX_WINDOW_SECS}")]
    WindowTooLong,

    #[error("rate_limit.max_requests must be greater than zero")]
    ZeroMaxRequests,

    #[error("{field} is not a valid socket address: {value}")]
    BadAddress { field: &'static str, value: String },

    #[error("listener.max_body_bytes must be greater than zero")]
    ZeroBodyLimit,
}

pub fn validate_config(config: &MonitorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.auth.jwt_secret.len() < MIN_SECRET_LEN {
        errors.push(ValidationError::WeakSecret);
    }
    if config.auth.token_ttl_secs == 0 {
        errors.push(ValidationError::ZeroTokenTtl);
    }

    let key_ok = BASE64
        .decode(config.encryption.key.trim())
        .map(|k| k.len() == 32)
        .unwrap_or(false);
    if !key_ok {
        errors.push(ValidationError::BadEncryptionKey);
    }

    if config.rate_limit.enabled {
        if config.rate_limit.window_secs == 0 {
            errors.push(ValidationError::ZeroWindow);
        } else if config.rate_limit.window_secs > MAX_WINDOW_SECS {
            errors.push(ValidationError::WindowTooLong);
        }
        if config.rate_limit.max_requests == 0 {
            errors.push(ValidationError::ZeroMaxRequests);
        }
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::BadAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
