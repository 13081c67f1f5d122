//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request ID, body limit, timeout)
//! - Split public routes from bearer-protected ones
//! - Count responses by status
//! - Serve until the shutdown future resolves

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::schema::ListenerConfig;
use crate::http::auth::require_bearer;
use crate::http::handlers;
use crate::observability::metrics;
use crate::service::MonitorService;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MonitorService>,
}

/// HTTP front end for the monitor service.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(service: Arc<MonitorService>, config: &ListenerConfig) -> Self {
        let router = Self::build_router(config, AppState { service });
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ListenerConfig, state: AppState) -> Router {
        let protected = Router::new()
            .route("/users/{id}", get(handlers::get_user))
            .route("/users/{id}/role", put(handlers::change_role))
            .route("/decisions", post(handlers::create_decision))
            .route("/decisions/{id}", get(handlers::get_decision))
            .route("/logs", post(handlers::append_log))
            .route("/ethics/evaluate", post(handlers::evaluate_ethics))
            .route("/ethics/fairness", post(handlers::assess_fairness))
            .route("/ethics/security-report", get(handlers::security_report))
            .route("/audit", get(handlers::query_audit))
            .route("/audit/verify", get(handlers::verify_audit))
            .route_layer(middleware::from_fn(require_bearer));

        Router::new()
            .route("/health", get(handlers::health))
            .route("/auth/login", post(handlers::login))
            .route("/users", post(handlers::register_user))
            .merge(protected)
            .with_state(state)
            .layer(middleware::from_fn(count_responses))
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id,
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` resolves, then drain in-flight
    /// requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn count_responses(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    metrics::record_request(response.status().as_u16());
    response
}
