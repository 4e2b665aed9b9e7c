//! Issuing and matching one-time passcodes.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, Rng};

use super::error::{AuthError, CodeRejection};
use super::hasher;
use super::notifier::Notifier;
use super::store::OtpStore;
use crate::config::OtpConfig;
use crate::models::{NewOtpRecord, OtpPurpose, OtpRecord};

/// Outcome of a successful issue. Never carries the code or its hash.
#[derive(Debug, Clone, Copy)]
pub struct IssuedCode {
    pub record_id: i64,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct OtpIssuer {
    store: Arc<dyn OtpStore>,
    notifier: Arc<dyn Notifier>,
    config: OtpConfig,
}

impl OtpIssuer {
    pub fn new(store: Arc<dyn OtpStore>, notifier: Arc<dyn Notifier>, config: OtpConfig) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    pub fn code_length(&self) -> usize {
        self.config.length
    }

    /// Generate, persist and deliver a fresh code for an already normalized email.
    pub async fn issue(&self, email: &str, now: DateTime<Utc>) -> Result<IssuedCode, AuthError> {
        self.enforce_send_limit(email, now).await?;

        if self.config.invalidate_previous {
            let invalidated = self
                .store
                .invalidate_pending(email, OtpPurpose::SignIn, now)
                .await?;
            if invalidated > 0 {
                tracing::debug!(invalidated, "Invalidated earlier pending codes");
            }
        }

        let code = generate_code(self.config.length);
        let record = self
            .store
            .insert_otp(NewOtpRecord {
                email: email.to_string(),
                code_hash: hasher::hash_code(&code),
                purpose: OtpPurpose::SignIn,
                expires_at: now + Duration::minutes(self.config.ttl_minutes),
                created_at: now,
            })
            .await?;

        // The record stays valid when delivery fails; a new send recovers.
        if let Err(e) = self
            .notifier
            .deliver_code(email, &code, self.config.ttl_minutes)
            .await
        {
            tracing::error!(record_id = record.id, error = %e, "Failed to deliver verification code");
            metrics::counter!("otp_delivery_failures_total").increment(1);
            return Err(AuthError::DeliveryFailure(e.to_string()));
        }

        metrics::counter!("otp_codes_issued_total").increment(1);
        tracing::info!(record_id = record.id, expires_at = %record.expires_at, "Verification code issued");

        Ok(IssuedCode {
            record_id: record.id,
            expires_at: record.expires_at,
        })
    }

    async fn enforce_send_limit(&self, email: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
        if self.config.max_sends_per_window == 0 {
            return Ok(());
        }

        let window = Duration::minutes(self.config.send_window_minutes);
        let issued = self.store.count_issued_since(email, now - window).await?;
        if issued >= i64::from(self.config.max_sends_per_window) {
            tracing::warn!(issued, "Per-email send limit reached");
            return Err(AuthError::TooManyRequests {
                retry_after_secs: window.num_seconds().max(1) as u64,
            });
        }
        Ok(())
    }
}

/// Uniform random decimal code from the OS CSPRNG.
pub fn generate_code(length: usize) -> String {
    let mut rng = OsRng;
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

#[derive(Clone)]
pub struct OtpVerifier {
    store: Arc<dyn OtpStore>,
}

impl OtpVerifier {
    pub fn new(store: Arc<dyn OtpStore>) -> Self {
        Self { store }
    }

    /// Match `code` against the newest eligible record for `email`.
    ///
    /// Does not consume; see [`OtpVerifier::consume`].
    pub async fn find_match(
        &self,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<OtpRecord, AuthError> {
        let record = self
            .store
            .find_latest_pending(email, OtpPurpose::SignIn, now)
            .await?
            .ok_or(AuthError::InvalidOrExpiredCode(CodeRejection::NoEligibleRecord))?;

        if !hasher::verify_code(code, &record.code_hash) {
            return Err(AuthError::InvalidOrExpiredCode(CodeRejection::Mismatch));
        }

        Ok(record)
    }

    /// Atomically mark a matched record consumed. Only one caller wins.
    pub async fn consume(&self, record: &OtpRecord, now: DateTime<Utc>) -> Result<(), AuthError> {
        if self.store.consume_otp(record.id, now).await? {
            Ok(())
        } else {
            Err(AuthError::InvalidOrExpiredCode(CodeRejection::AlreadyConsumed))
        }
    }
}
