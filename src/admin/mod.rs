//! Operator endpoints for inspecting and overriding breakers.
//!
//! All routes require the bearer `admin.api_key` and are mounted only when
//! `admin.enabled` is set.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::AppState;

pub fn setup_admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/breakers", get(list_breakers))
        .route("/admin/breakers/{name}", get(show_breaker))
        .route("/admin/breakers/{name}/reset", post(reset_breaker))
        .route("/admin/breakers/{name}/trip", post(trip_breaker))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
