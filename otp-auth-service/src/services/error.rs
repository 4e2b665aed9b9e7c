use service_core::error::AppError;
use thiserror::Error;

use super::store::StoreError;

/// Why a submitted code was refused.
///
/// Kept for logs and metrics only; callers always see the same
/// "invalid or expired" outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeRejection {
    /// No unconsumed, unexpired record exists for the address.
    NoEligibleRecord,
    /// The newest eligible record does not match the submitted code.
    Mismatch,
    /// Another request consumed the record first.
    AlreadyConsumed,
}

impl CodeRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeRejection::NoEligibleRecord => "no_eligible_record",
            CodeRejection::Mismatch => "mismatch",
            CodeRejection::AlreadyConsumed => "already_consumed",
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid or expired code")]
    InvalidOrExpiredCode(CodeRejection),

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Verification code could not be delivered: {0}")]
    DeliveryFailure(String),

    #[error("Identity creation raced with a concurrent verification")]
    ConflictRetry,

    #[error("Too many verification codes requested")]
    TooManyRequests { retry_after_secs: u64 },

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Session token error: {0}")]
    Session(#[from] jsonwebtoken::errors::Error),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            AuthError::InvalidOrExpiredCode(_) => {
                AppError::BadRequest(anyhow::anyhow!("Invalid or expired code"))
            }
            AuthError::AccountDisabled => {
                AppError::Forbidden(anyhow::anyhow!("Account is disabled"))
            }
            AuthError::DeliveryFailure(_) => AppError::BadGateway(
                "Verification code could not be delivered, please request a new one".to_string(),
            ),
            AuthError::ConflictRetry => {
                AppError::InternalError(anyhow::anyhow!("Identity resolution failed"))
            }
            AuthError::TooManyRequests { retry_after_secs } => AppError::TooManyRequests(
                "Too many verification codes requested. Please try again later.".to_string(),
                Some(retry_after_secs),
            ),
            AuthError::Store(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            AuthError::Session(e) => AppError::InternalError(anyhow::Error::new(e)),
        }
    }
}
