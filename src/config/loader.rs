//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::MonitorConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Load a TOML file, apply environment overrides, then validate.
pub fn load_config(path: &Path) -> Result<MonitorConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: MonitorConfig = toml::from_str(&content)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Defaults plus environment overrides, validated. Used when no file is given.
pub fn load_from_env() -> Result<MonitorConfig, ConfigError> {
    let mut config = MonitorConfig::default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay environment variables on `config`.
///
/// Unparseable numeric values are ignored with a warning.
pub fn apply_env_overrides<F>(config: &mut MonitorConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(secret) = lookup("JWT_SECRET_KEY") {
        config.auth.jwt_secret = secret;
    }
    if let Some(hours) = parse_number::<u64>(&lookup, "JWT_EXPIRY_HOURS") {
        config.auth.token_ttl_secs = hours.saturating_mul(3600);
    }
    if let Some(max) = parse_number::<usize>(&lookup, "RATE_LIMIT_MAX") {
        config.rate_limit.max_requests = max;
    }
    if let Some(window) = parse_number::<u64>(&lookup, "RATE_LIMIT_WINDOW") {
        config.rate_limit.window_secs = window;
    }
    if let Some(key) = lookup("FIELD_ENCRYPTION_KEY") {
        config.encryption.key = key;
    }
    if let Some(path) = lookup("DATABASE_PATH") {
        config.storage.path = Some(path);
    }
    if let Some(level) = lookup("LOG_LEVEL") {
        config.observability.log_level = level.to_lowercase();
    }

    let host = lookup("API_HOST");
    let port = parse_number::<u16>(&lookup, "API_PORT");
    if host.is_some() || port.is_some() {
        let (current_host, current_port) = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(h, p)| (h.to_string(), p.parse().unwrap_or(5000)))
            .unwrap_or_else(|| ("0.0.0.0".to_string(), 5000));
        config.listener.bind_address = format!(
            "{}:{}",
            host.unwrap_or(current_host),
            port.unwrap_or(current_port)
        );
    }
}

fn parse_number<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(variable = key, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}
