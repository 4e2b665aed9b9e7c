use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::PublicIdentity;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SendCodeRequest {
    #[validate(length(min = 1, max = 320, message = "Email is required"))]
    #[schema(example = "user@example.com")]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SendCodeResponse {
    #[schema(example = "If the address can receive mail, a verification code is on its way.")]
    pub message: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyCodeRequest {
    #[validate(length(min = 1, max = 320, message = "Email is required"))]
    #[schema(example = "user@example.com")]
    pub email: String,

    #[validate(length(min = 1, max = 16, message = "Code is required"))]
    #[schema(example = "482913")]
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyCodeResponse {
    pub identity: PublicIdentity,
    pub session_token: String,
    #[schema(example = "bearer")]
    pub token_type: String,
    /// Session lifetime in seconds.
    #[schema(example = 2592000)]
    pub expires_in: i64,
}
