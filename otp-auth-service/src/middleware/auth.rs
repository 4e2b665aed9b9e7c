use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::IntoResponse,
};
use chrono::Utc;
use service_core::error::AppError;

use crate::{services::SessionClaims, AppState};

/// Require a valid `Authorization: Bearer <session token>`.
pub async fn session_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
        })?;

    let claims = state.auth.sessions().verify(token, Utc::now()).map_err(|e| {
        tracing::debug!(error = %e, "Session token rejected");
        AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token"))
    })?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Claims of the authenticated session, set by [`session_auth_middleware`].
pub struct AuthUser(pub SessionClaims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts.extensions.get::<SessionClaims>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("Session claims missing from request extensions"))
        })?;

        Ok(AuthUser(claims.clone()))
    }
}
