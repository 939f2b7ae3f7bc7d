//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Guard the store-backed routes with the breaker middleware
//! - Wire up middleware (tracing, timeout, panic recovery)
//! - Mount admin endpoints when enabled
//! - Serve until Ctrl+C
//!
//! # Design Decisions
//! - Guarded routes time out inside the breaker middleware with a 504, so a
//!   hung dependency counts as a failure instead of dropping the outcome
//! - Unguarded routes time out with a plain 408

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, middleware, routing::get, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::setup_admin_router;
use crate::config::ServiceConfig;
use crate::http::error::ApiError;
use crate::http::middleware::breaker_middleware;
use crate::resilience::{BreakerRegistry, Gate};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gate: Gate,
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    pub fn registry(&self) -> &Arc<BreakerRegistry> {
        self.gate.registry()
    }
}

/// HTTP server for the breaker service.
pub struct HttpServer {
    router: Router,
    config: Arc<ServiceConfig>,
}

impl HttpServer {
    pub fn new(config: ServiceConfig, registry: Arc<BreakerRegistry>) -> Self {
        let config = Arc::new(config);
        let state = AppState {
            gate: Gate::new(registry),
            config: Arc::clone(&config),
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(config: &ServiceConfig, state: AppState) -> Router {
        let timeout = Duration::from_secs(config.server.request_timeout_secs);

        let guarded = Router::new()
            .route("/status", get(status_handler))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::GATEWAY_TIMEOUT,
                timeout,
            ))
            .route_layer(middleware::from_fn_with_state(
                state.gate.clone(),
                breaker_middleware,
            ));

        let mut router = Router::new().route("/health", get(health_handler));

        if config.admin.enabled {
            router = router.merge(setup_admin_router(state.clone()));
        }

        router
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                timeout,
            ))
            .merge(guarded)
            .with_state(state)
            .layer(CatchPanicLayer::new())
            .layer(TraceLayer::new_for_http())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            admin_enabled = self.config.admin.enabled,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    store: &'static str,
    breakers: usize,
}

/// Store connectivity check. A store failure is a 503, which this route's
/// own breaker counts.
async fn status_handler(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    state.registry().store().ping().await?;
    Ok(Json(StatusResponse {
        status: "ok",
        store: "reachable",
        breakers: state.registry().len(),
    }))
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for Ctrl+C, serving until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
