use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::AppState;

/// Liveness
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is running")
    ),
    tag = "Observability"
)]
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
    }))
}

/// Readiness: the backing store answers
#[utoipa::path(
    get,
    path = "/health/db",
    responses(
        (status = 200, description = "Store reachable"),
        (status = 503, description = "Store unreachable", body = ErrorResponse)
    ),
    tag = "Observability"
)]
pub async fn health_db(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    state.health.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Database health check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "checks": {
            "database": "up"
        }
    })))
}
