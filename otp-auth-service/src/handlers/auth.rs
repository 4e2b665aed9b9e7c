use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::auth::{SendCodeRequest, SendCodeResponse, VerifyCodeRequest, VerifyCodeResponse},
    utils::ValidatedJson,
    AppState,
};

/// Same text for new and known addresses.
pub const SEND_CODE_MESSAGE: &str =
    "If the address can receive mail, a verification code is on its way.";

/// Request a one-time sign-in code by email
#[utoipa::path(
    post,
    path = "/api/v1/auth/send-code",
    request_body = SendCodeRequest,
    responses(
        (status = 200, description = "Code issued", body = SendCodeResponse),
        (status = 400, description = "Malformed email", body = ErrorResponse),
        (status = 403, description = "Account disabled", body = ErrorResponse),
        (status = 429, description = "Too many codes requested", body = ErrorResponse),
        (status = 502, description = "Code could not be delivered", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn send_code(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SendCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.auth.send_code(&req.email).await?;
    Ok((
        StatusCode::OK,
        Json(SendCodeResponse {
            message: SEND_CODE_MESSAGE.to_string(),
        }),
    ))
}

/// Exchange a code for a session token, creating the identity on first use
#[utoipa::path(
    post,
    path = "/api/v1/auth/verify-code",
    request_body = VerifyCodeRequest,
    responses(
        (status = 200, description = "Verified", body = VerifyCodeResponse),
        (status = 400, description = "Invalid or expired code", body = ErrorResponse),
        (status = 403, description = "Account disabled", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn verify_code(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<VerifyCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let authenticated = state.auth.verify_code(&req.email, &req.code).await?;
    Ok((
        StatusCode::OK,
        Json(VerifyCodeResponse {
            identity: authenticated.identity.public(),
            session_token: authenticated.session.token,
            token_type: "bearer".to_string(),
            expires_in: authenticated.session.expires_in,
        }),
    ))
}
