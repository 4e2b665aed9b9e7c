use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{middleware::AuthUser, models::Identity, services::SessionClaims, AppState};

/// Load the session's identity. A valid token for a disabled account is refused.
async fn active_identity(state: &AppState, claims: &SessionClaims) -> Result<Identity, AppError> {
    let id = claims
        .identity_id()
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token")))?;

    let identity = state
        .auth
        .identity(id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    if !identity.is_active {
        return Err(AppError::Forbidden(anyhow::anyhow!("Account is disabled")));
    }
    Ok(identity)
}

/// Current identity
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses(
        (status = 200, description = "Current identity", body = PublicIdentity),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 403, description = "Account is disabled", body = ErrorResponse),
        (status = 404, description = "Identity not found", body = ErrorResponse)
    ),
    tag = "User",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let identity = active_identity(&state, &user.0).await?;
    Ok(Json(identity.public()))
}

/// Deactivate the current identity
#[utoipa::path(
    delete,
    path = "/api/v1/users/me",
    responses(
        (status = 204, description = "Identity deactivated"),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 403, description = "Account is disabled", body = ErrorResponse),
        (status = 404, description = "Identity not found", body = ErrorResponse)
    ),
    tag = "User",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let identity = active_identity(&state, &user.0).await?;

    if !state.auth.deactivate(identity.id).await? {
        return Err(AppError::NotFound(anyhow::anyhow!("User not found")));
    }

    Ok(StatusCode::NO_CONTENT)
}
