//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, `audit` target for security)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! The tamper-evident audit trail is not a log sink; it lives in `audit`
//! and is persisted with the records it describes.

pub mod logging;
pub mod metrics;
