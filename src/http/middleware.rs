//! Circuit breaker middleware for HTTP routes.
//!
//! # Responsibilities
//! - Name a breaker per route: `"{METHOD} {matched route}"`
//! - Reject with 503 while that breaker is open
//! - Report 5xx responses and handler panics as failures
//!
//! # Design Decisions
//! - Installed with `route_layer` so the matched route template is known
//! - Panics are re-raised after recording; `CatchPanicLayer` further out
//!   turns them into 500 responses
//! - A request dropped after admission is still counted as a failure by
//!   `Gate::call`

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::error::ApiError;
use crate::resilience::Gate;

/// Breaker name for a request; falls back to the raw path when unrouted.
pub fn breaker_name(request: &Request<Body>) -> String {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());
    format!("{} {}", request.method(), path)
}

pub async fn breaker_middleware(
    State(gate): State<Gate>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let name = breaker_name(&request);

    let outcome = gate
        .call(&name, next.run(request), |response: &Response| {
            response.status().is_server_error()
        })
        .await;

    match outcome {
        Ok(response) => response,
        Err(err) => {
            tracing::debug!(breaker = %name, "Request rejected by open circuit");
            ApiError::from(err).into_response()
        }
    }
}
