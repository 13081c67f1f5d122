//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, overlay environment)
//!     → validation.rs (semantic checks)
//!     → MonitorConfig (validated, immutable)
//!     → consumed once by MonitorService::from_config
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the encryption key is never rotated
//!   at runtime
//! - All fields have defaults except the two secrets
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_env, ConfigError};
pub use schema::{HashMode, LogFormat, MonitorConfig};
pub use validation::{validate_config, ValidationError};
