use axum::{
    extract::{Path, State},
    Json,
};

use crate::http::{ApiError, AppState};
use crate::resilience::BreakerSnapshot;

/// Snapshots of every breaker this process has constructed.
pub async fn list_breakers(
    State(state): State<AppState>,
) -> Result<Json<Vec<BreakerSnapshot>>, ApiError> {
    let registry = state.registry();
    let mut snapshots = Vec::with_capacity(registry.len());
    for name in registry.names() {
        snapshots.push(registry.get(&name).snapshot().await?);
    }
    Ok(Json(snapshots))
}

pub async fn show_breaker(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<BreakerSnapshot>, ApiError> {
    let breaker = state
        .registry()
        .existing(&name)
        .ok_or_else(|| ApiError::NotFound(format!("no breaker named '{}'", name)))?;
    Ok(Json(breaker.snapshot().await?))
}

// Store state is fleet-wide, so reset and trip accept names this process has
// not used yet and construct the breaker on demand.
pub async fn reset_breaker(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<BreakerSnapshot>, ApiError> {
    let breaker = state.registry().get(&name);
    breaker.reset().await?;
    Ok(Json(breaker.snapshot().await?))
}

pub async fn trip_breaker(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<BreakerSnapshot>, ApiError> {
    let breaker = state.registry().get(&name);
    breaker.trip().await?;
    Ok(Json(breaker.snapshot().await?))
}
