//! Persistence seams for the OTP core.
//!
//! All cross-request coordination goes through these traits: consumption is a
//! compare-and-set and identity creation relies on a unique email. No
//! in-process locking is layered on top, so several service instances can
//! share one backing store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Identity, NewOtpRecord, OtpPurpose, OtpRecord};

#[derive(Error, Debug)]
pub enum StoreError {
    /// An insert collided with a unique index.
    #[error("Unique constraint violated")]
    UniqueViolation,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store error: {0}")]
    Backend(anyhow::Error),
}

#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn insert_otp(&self, record: NewOtpRecord) -> Result<OtpRecord, StoreError>;

    /// Most recently created record for `email` that is unconsumed and unexpired at `now`.
    async fn find_latest_pending(
        &self,
        email: &str,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> Result<Option<OtpRecord>, StoreError>;

    /// Mark one record consumed if, and only if, it is still unconsumed and unexpired.
    ///
    /// Returns `false` when another caller got there first.
    async fn consume_otp(&self, id: i64, now: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Mark every pending record for `email` consumed. Returns how many changed.
    async fn invalidate_pending(
        &self,
        email: &str,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// Records created for `email` at or after `since`, consumed or not.
    async fn count_issued_since(
        &self,
        email: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError>;

    /// Delete records whose expiry lies before `now`. Returns how many went.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_identity_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError>;

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError>;

    /// Fails with [`StoreError::UniqueViolation`] when the email is taken.
    async fn insert_identity(&self, identity: &Identity) -> Result<Identity, StoreError>;

    /// Stamp a successful sign-in on an active identity. Returns `None` when
    /// the identity is missing or disabled, checked in the same write.
    async fn record_login(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>, StoreError>;

    /// Soft delete. Returns `false` when no such identity exists.
    async fn deactivate_identity(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn health_check(&self) -> Result<(), StoreError>;
}
