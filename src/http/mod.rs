//! HTTP surface of the monitor.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (request ID, tracing, body limit, timeout)
//!     → auth.rs (bearer token required on protected routes)
//!     → handlers.rs (blocking pool → MonitorService)
//!     → error.rs (ServiceError → status + categorical body)
//!     → Send to client
//! ```

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use error::ApiError;
pub use server::{AppState, HttpServer, X_REQUEST_ID};
