//! API error type and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::resilience::BreakerError;
use crate::store::StoreError;

#[derive(Debug)]
pub enum ApiError {
    /// Breaker declined the call.
    CircuitOpen(String),
    Store(StoreError),
    Unauthorized,
    NotFound(String),
}

impl From<BreakerError> for ApiError {
    fn from(err: BreakerError) -> Self {
        match err {
            BreakerError::CircuitOpen { name } => Self::CircuitOpen(name),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::CircuitOpen(name) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("service temporarily unavailable: circuit '{}' is open", name),
            ),
            ApiError::Store(err) => {
                tracing::warn!(error = %err, "Store request failed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "breaker store unavailable".to_string(),
                )
            }
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl IntoResponse for BreakerError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
