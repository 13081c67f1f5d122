//! Ethics Monitor Library
//!
//! Backend that records AI-model decisions, evaluates them for bias and keeps
//! a tamper-evident audit trail, gated by token authentication, role-based
//! access control and per-principal rate limiting.

// Core subsystems
pub mod audit;
pub mod ethics;
pub mod security;
pub mod service;
pub mod storage;

// Surfaces
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::schema::MonitorConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use service::MonitorService;
