//! OTP record model - one issued one-time-passcode challenge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Why a code was issued.
///
/// Registration and login share one flow, so every challenge carries the same tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    SignIn,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::SignIn => "sign_in",
        }
    }
}

/// Lifecycle state, derived at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpState {
    Pending,
    Consumed,
    Expired,
}

/// OTP record entity. Holds the code hash, never the code.
#[derive(Debug, Clone, FromRow)]
pub struct OtpRecord {
    pub id: i64,
    pub email: String,
    pub code_hash: String,
    pub purpose: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub consumed: bool,
    pub consumed_at: Option<DateTime<Utc>>,
}

impl OtpRecord {
    /// Consumption is terminal and wins over expiry.
    pub fn state_at(&self, now: DateTime<Utc>) -> OtpState {
        if self.consumed {
            OtpState::Consumed
        } else if now >= self.expires_at {
            OtpState::Expired
        } else {
            OtpState::Pending
        }
    }

    /// Check if the record may still be matched by a verification.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == OtpState::Pending
    }
}

/// Insert payload; the store assigns `id`.
#[derive(Debug, Clone)]
pub struct NewOtpRecord {
    pub email: String,
    pub code_hash: String,
    pub purpose: OtpPurpose,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
