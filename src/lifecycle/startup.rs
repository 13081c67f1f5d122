//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Open the store and construct the service
//! - Bind the listener and start serving
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The listener binds last, so traffic only arrives once the store is open

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::{validate_config, MonitorConfig, ValidationError};
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::service::{MonitorService, ServiceError};

#[derive(Debug, Error)]
pub enum StartupError {
    /// Configuration failed semantic validation.
    #[error("invalid configuration: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Config(Vec<ValidationError>),

    /// Service construction failed (bad key material, unreadable store).
    #[error("service initialization failed: {0}")]
    Service(#[from] ServiceError),

    /// Listener could not be bound or the server failed.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Server task panicked.
    #[error("server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A server accepting connections in a background task.
pub struct Running {
    pub local_addr: SocketAddr,
    pub service: Arc<MonitorService>,
    shutdown: Shutdown,
    handle: JoinHandle<Result<(), std::io::Error>>,
}

/// Validate `config`, build the service and start serving.
pub async fn start(config: &MonitorConfig) -> Result<Running, StartupError> {
    validate_config(config).map_err(StartupError::Config)?;

    let service = Arc::new(MonitorService::from_config(config)?);
    service.record_system_event("Monitor started")?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;

    let shutdown = Shutdown::new();
    let server = HttpServer::new(service.clone(), &config.listener);
    let handle = tokio::spawn(server.run(listener, shutdown.signalled()));

    tracing::info!(
        address = %local_addr,
        hash_mode = ?config.audit.hash_mode,
        rate_limit_max = config.rate_limit.max_requests,
        rate_limit_window_secs = config.rate_limit.window_secs,
        "Listening for connections"
    );

    Ok(Running {
        local_addr,
        service,
        shutdown,
        handle,
    })
}

impl Running {
    /// Serve until `signal` resolves or the server exits on its own.
    pub async fn run_until<F>(mut self, signal: F) -> Result<(), StartupError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = &mut self.handle => return Ok(result??),
            _ = signal => tracing::info!("Shutdown signal received"),
        }
        self.stop().await
    }

    /// Stop accepting, drain in-flight requests and wait for the server task.
    pub async fn stop(self) -> Result<(), StartupError> {
        self.shutdown.trigger();
        self.handle.await??;
        if let Err(e) = self.service.record_system_event("Monitor stopped") {
            tracing::error!(error = %e, "Failed to record shutdown");
        }
        Ok(())
    }
}
