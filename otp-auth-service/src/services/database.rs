//! PostgreSQL storage for identities and OTP records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use uuid::Uuid;

use super::store::{HealthCheck, IdentityStore, OtpStore, StoreError};
use crate::models::{Identity, NewOtpRecord, OtpPurpose, OtpRecord};

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_sqlx(err: sqlx::Error) -> StoreError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return StoreError::UniqueViolation;
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl HealthCheck for Database {
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                StoreError::Database(e)
            })?;
        Ok(())
    }
}

#[async_trait]
impl OtpStore for Database {
    async fn insert_otp(&self, record: NewOtpRecord) -> Result<OtpRecord, StoreError> {
        sqlx::query_as::<_, OtpRecord>(
            r#"
            INSERT INTO otp_records (email, code_hash, purpose, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&record.email)
        .bind(&record.code_hash)
        .bind(record.purpose.as_str())
        .bind(record.expires_at)
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn find_latest_pending(
        &self,
        email: &str,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> Result<Option<OtpRecord>, StoreError> {
        sqlx::query_as::<_, OtpRecord>(
            r#"
            SELECT * FROM otp_records
            WHERE email = $1 AND purpose = $2 AND consumed = FALSE AND expires_at > $3
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .bind(purpose.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn consume_otp(&self, id: i64, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE otp_records
            SET consumed = TRUE, consumed_at = $2
            WHERE id = $1 AND consumed = FALSE AND expires_at > $2
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(result.rows_affected() == 1)
    }

    async fn invalidate_pending(
        &self,
        email: &str,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE otp_records
            SET consumed = TRUE, consumed_at = $3
            WHERE email = $1 AND purpose = $2 AND consumed = FALSE AND expires_at > $3
            "#,
        )
        .bind(email)
        .bind(purpose.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(result.rows_affected())
    }

    async fn count_issued_since(
        &self,
        email: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM otp_records WHERE email = $1 AND created_at >= $2")
                .bind(email)
                .bind(since)
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx)?;
        Ok(count)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM otp_records WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl IdentityStore for Database {
    async fn find_identity_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        sqlx::query_as::<_, Identity>("SELECT * FROM identities WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)
    }

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        sqlx::query_as::<_, Identity>("SELECT * FROM identities WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)
    }

    async fn insert_identity(&self, identity: &Identity) -> Result<Identity, StoreError> {
        sqlx::query_as::<_, Identity>(
            r#"
            INSERT INTO identities (id, email, email_verified, is_active, created_at, updated_at, last_login_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(identity.id)
        .bind(&identity.email)
        .bind(identity.email_verified)
        .bind(identity.is_active)
        .bind(identity.created_at)
        .bind(identity.updated_at)
        .bind(identity.last_login_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn record_login(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>, StoreError> {
        sqlx::query_as::<_, Identity>(
            r#"
            UPDATE identities
            SET last_login_at = $2, updated_at = $2, email_verified = TRUE
            WHERE id = $1 AND is_active = TRUE
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn deactivate_identity(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let result =
            sqlx::query("UPDATE identities SET is_active = FALSE, updated_at = $2 WHERE id = $1")
                .bind(id)
                .bind(now)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx)?;
        Ok(result.rows_affected() == 1)
    }
}
