//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files. Every
//! section has defaults so a minimal file only needs the two secrets.

use serde::{Deserialize, Serialize};

/// Root configuration for the monitor.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MonitorConfig {
    /// HTTP listener settings.
    pub listener: ListenerConfig,

    /// Token signing settings.
    pub auth: AuthConfig,

    /// Per-principal rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Sensitive-field encryption.
    pub encryption: EncryptionConfig,

    /// Audit ledger behaviour.
    pub audit: AuditConfig,

    /// Record store location.
    pub storage: StorageConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,

    /// Largest accepted request body; larger requests get 413.
    pub max_body_bytes: usize,

    /// Total time allowed per request.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
            max_body_bytes: 1024 * 1024,
            request_timeout_secs: 30,
        }
    }
}

/// Session token configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for session tokens. Required, at least 32 bytes.
    pub jwt_secret: String,

    /// Token lifetime in seconds.
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_secs: 24 * 3600,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Calls admitted per principal in any trailing window.
    pub max_requests: usize,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Append a `RATE_LIMIT` audit entry on every rejection.
    pub audit_rejections: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window_secs: 3600,
            audit_rejections: false,
        }
    }
}

/// Field encryption configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EncryptionConfig {
    /// Base64 of a 32-byte AES-256 key. Required.
    pub key: String,

    /// Store plaintext if encryption fails instead of rejecting the write.
    /// Insecure; off unless explicitly enabled.
    pub allow_plaintext_fallback: bool,
}

/// How audit integrity hashes are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HashMode {
    /// Each hash covers only its own record.
    #[default]
    PerRecord,
    /// Each hash also covers the previous record's hash.
    Chained,
}

/// Audit ledger configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuditConfig {
    pub hash_mode: HashMode,
}

/// Record store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON file backing the store. In-memory when absent.
    pub path: Option<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_file_uses_defaults() {
        let config: MonitorConfig = toml::from_str(
            r#"
            [auth]
            jwt_secret = "s"

            [encryption]
            key = "k"
            "#,
        )
        .unwrap();

        assert_eq!(config.auth.token_ttl_secs, 86_400);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.rate_limit.window_secs, 3600);
        assert_eq!(config.audit.hash_mode, HashMode::PerRecord);
        assert!(config.storage.path.is_none());
        assert!(!config.encryption.allow_plaintext_fallback);
    }

    #[test]
    fn test_enums_parse_snake_case() {
        let config: MonitorConfig = toml::from_str(
            r#"
            [audit]
            hash_mode = "chained"

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.audit.hash_mode, HashMode::Chained);
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }
}
