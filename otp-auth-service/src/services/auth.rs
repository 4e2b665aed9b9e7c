//! The send-code and verify-code flows.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::error::AuthError;
use super::identity::IdentityProvisioner;
use super::notifier::Notifier;
use super::otp::{IssuedCode, OtpIssuer, OtpVerifier};
use super::session::{SessionIssuer, SessionToken};
use super::store::{IdentityStore, OtpStore};
use crate::config::{OtpConfig, SessionConfig};
use crate::models::Identity;
use crate::utils::email::{is_valid_email, normalize_email};

/// A successful verification.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub identity: Identity,
    pub session: SessionToken,
    /// Whether this verification created the identity.
    pub created: bool,
}

#[derive(Clone)]
pub struct AuthService {
    issuer: OtpIssuer,
    verifier: OtpVerifier,
    provisioner: IdentityProvisioner,
    sessions: SessionIssuer,
    identities: Arc<dyn IdentityStore>,
}

impl AuthService {
    pub fn new(
        otps: Arc<dyn OtpStore>,
        identities: Arc<dyn IdentityStore>,
        notifier: Arc<dyn Notifier>,
        otp_config: &OtpConfig,
        session_config: &SessionConfig,
    ) -> Self {
        Self {
            issuer: OtpIssuer::new(otps.clone(), notifier, otp_config.clone()),
            verifier: OtpVerifier::new(otps),
            provisioner: IdentityProvisioner::new(identities.clone()),
            sessions: SessionIssuer::new(session_config),
            identities,
        }
    }

    pub fn sessions(&self) -> &SessionIssuer {
        &self.sessions
    }

    /// Issue and deliver a code. The outcome is the same for new and known
    /// addresses; only disabled accounts are refused.
    #[tracing::instrument(skip_all)]
    pub async fn send_code(&self, email: &str) -> Result<IssuedCode, AuthError> {
        let email = validated_email(email)?;
        let now = Utc::now();

        if let Some(identity) = self.provisioner.find_by_email(&email).await? {
            if !identity.is_active {
                tracing::warn!(identity_id = %identity.id, "Code requested for disabled account");
                return Err(AuthError::AccountDisabled);
            }
        }

        self.issuer.issue(&email, now).await
    }

    /// Check a code, consume it, resolve the identity and mint a session.
    #[tracing::instrument(skip_all)]
    pub async fn verify_code(&self, email: &str, code: &str) -> Result<Authenticated, AuthError> {
        let email = validated_email(email)?;
        self.validate_code_shape(code)?;
        let now = Utc::now();

        let record = match self.verifier.find_match(&email, code, now).await {
            Ok(record) => record,
            Err(e) => return Err(record_failure(e)),
        };

        if let Some(identity) = self.provisioner.find_by_email(&email).await? {
            if !identity.is_active {
                tracing::warn!(identity_id = %identity.id, "Verification for disabled account");
                metrics::counter!("otp_verifications_total", "outcome" => "account_disabled")
                    .increment(1);
                return Err(AuthError::AccountDisabled);
            }
        }

        if let Err(e) = self.verifier.consume(&record, now).await {
            return Err(record_failure(e));
        }

        // The code stays consumed even if anything below fails.
        let resolved = self.provisioner.resolve(&email, now).await?;
        let session = self.sessions.issue(&resolved.identity, now)?;

        metrics::counter!("otp_verifications_total", "outcome" => "success").increment(1);
        tracing::info!(
            identity_id = %resolved.identity.id,
            record_id = record.id,
            created = resolved.created,
            "Verification succeeded"
        );

        Ok(Authenticated {
            identity: resolved.identity,
            session,
            created: resolved.created,
        })
    }

    pub async fn identity(&self, id: Uuid) -> Result<Option<Identity>, AuthError> {
        Ok(self.identities.find_identity_by_id(id).await?)
    }

    /// Soft delete. Later sends and verifications for the email fail.
    #[tracing::instrument(skip(self))]
    pub async fn deactivate(&self, id: Uuid) -> Result<bool, AuthError> {
        let deactivated = self.identities.deactivate_identity(id, Utc::now()).await?;
        if deactivated {
            tracing::info!("Identity deactivated");
        }
        Ok(deactivated)
    }

    fn validate_code_shape(&self, code: &str) -> Result<(), AuthError> {
        if code.len() != self.issuer.code_length() || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AuthError::Validation(format!(
                "Code must be {} digits",
                self.issuer.code_length()
            )));
        }
        Ok(())
    }
}

fn validated_email(raw: &str) -> Result<String, AuthError> {
    let email = normalize_email(raw);
    if !is_valid_email(&email) {
        return Err(AuthError::Validation("Invalid email format".to_string()));
    }
    Ok(email)
}

fn record_failure(err: AuthError) -> AuthError {
    if let AuthError::InvalidOrExpiredCode(reason) = &err {
        tracing::info!(reason = reason.as_str(), "Verification rejected");
        metrics::counter!("otp_verifications_total", "outcome" => reason.as_str()).increment(1);
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::error::CodeRejection;
    use crate::services::memory::MemoryStore;
    use crate::services::notifier::RecordingNotifier;
    use crate::services::store::StoreError;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn otp_config() -> OtpConfig {
        OtpConfig {
            length: 6,
            ttl_minutes: 10,
            max_sends_per_window: 0,
            send_window_minutes: 15,
            invalidate_previous: false,
            sweep_interval_seconds: 300,
        }
    }

    fn session_config() -> SessionConfig {
        SessionConfig {
            secret: "unit-test-secret-with-at-least-32-bytes".to_string(),
            ttl_days: 30,
            issuer: "otp-auth-service".to_string(),
        }
    }

    fn service() -> (AuthService, Arc<MemoryStore>, Arc<RecordingNotifier>) {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let service = AuthService::new(
            store.clone(),
            store.clone(),
            notifier.clone(),
            &otp_config(),
            &session_config(),
        );
        (service, store, notifier)
    }

    /// Soft deletes the identity right after the next email lookup returns
    /// it, as a concurrent `DELETE /users/me` would.
    struct DeactivateAfterLookup {
        inner: Arc<MemoryStore>,
        armed: AtomicBool,
    }

    #[async_trait]
    impl IdentityStore for DeactivateAfterLookup {
        async fn find_identity_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
            self.inner.find_identity_by_id(id).await
        }

        async fn find_identity_by_email(
            &self,
            email: &str,
        ) -> Result<Option<Identity>, StoreError> {
            let found = self.inner.find_identity_by_email(email).await?;
            if let Some(identity) = &found {
                if self.armed.swap(false, Ordering::SeqCst) {
                    self.inner.deactivate_identity(identity.id, Utc::now()).await?;
                }
            }
            Ok(found)
        }

        async fn insert_identity(&self, identity: &Identity) -> Result<Identity, StoreError> {
            self.inner.insert_identity(identity).await
        }

        async fn record_login(
            &self,
            id: Uuid,
            now: DateTime<Utc>,
        ) -> Result<Option<Identity>, StoreError> {
            self.inner.record_login(id, now).await
        }

        async fn deactivate_identity(
            &self,
            id: Uuid,
            now: DateTime<Utc>,
        ) -> Result<bool, StoreError> {
            self.inner.deactivate_identity(id, now).await
        }
    }

    #[tokio::test]
    async fn email_is_normalized_before_issue() {
        let (service, store, notifier) = service();

        service.send_code("  A@X.com ").await.unwrap();

        assert_eq!(store.records_for("a@x.com").len(), 1);
        assert!(notifier.last_code_for("a@x.com").is_some());
    }

    #[tokio::test]
    async fn malformed_input_is_rejected_before_storage() {
        let (service, store, _) = service();

        assert!(matches!(
            service.send_code("not-an-email").await,
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            service.verify_code("a@x.com", "12ab56").await,
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            service.verify_code("a@x.com", "1234567").await,
            Err(AuthError::Validation(_))
        ));
        assert_eq!(store.otp_count(), 0);
    }

    #[tokio::test]
    async fn wrong_code_leaves_record_pending() {
        let (service, store, notifier) = service();
        service.send_code("a@x.com").await.unwrap();
        let code = notifier.last_code_for("a@x.com").unwrap();
        let wrong = if code == "000000" { "111111" } else { "000000" };

        let err = service.verify_code("a@x.com", wrong).await.unwrap_err();

        assert!(matches!(
            err,
            AuthError::InvalidOrExpiredCode(CodeRejection::Mismatch)
        ));
        assert!(store.records_for("a@x.com").iter().all(|r| !r.consumed));
        assert_eq!(store.identity_count(), 0);

        service.verify_code("a@x.com", &code).await.unwrap();
    }

    #[tokio::test]
    async fn disabled_account_fails_without_consuming() {
        let (service, store, notifier) = service();
        service.send_code("a@x.com").await.unwrap();
        let code = notifier.last_code_for("a@x.com").unwrap();
        let first = service.verify_code("a@x.com", &code).await.unwrap();

        service.send_code("a@x.com").await.unwrap();
        let code = notifier.last_code_for("a@x.com").unwrap();
        assert!(service.deactivate(first.identity.id).await.unwrap());

        let err = service.verify_code("a@x.com", &code).await.unwrap_err();
        assert!(matches!(err, AuthError::AccountDisabled));
        assert_eq!(
            store
                .records_for("a@x.com")
                .iter()
                .filter(|r| !r.consumed)
                .count(),
            1
        );

        let err = service.send_code("a@x.com").await.unwrap_err();
        assert!(matches!(err, AuthError::AccountDisabled));
    }

    #[tokio::test]
    async fn deactivation_during_verification_mints_no_session() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let identities = Arc::new(DeactivateAfterLookup {
            inner: store.clone(),
            armed: AtomicBool::new(false),
        });
        let service = AuthService::new(
            store.clone(),
            identities.clone(),
            notifier.clone(),
            &otp_config(),
            &session_config(),
        );
        service.send_code("a@x.com").await.unwrap();
        let code = notifier.last_code_for("a@x.com").unwrap();
        let first = service.verify_code("a@x.com", &code).await.unwrap();
        service.send_code("a@x.com").await.unwrap();
        let code = notifier.last_code_for("a@x.com").unwrap();

        identities.armed.store(true, Ordering::SeqCst);
        let err = service.verify_code("a@x.com", &code).await.unwrap_err();

        assert!(matches!(err, AuthError::AccountDisabled));
        let stored = store.find_identity_by_id(first.identity.id).await.unwrap().unwrap();
        assert!(!stored.is_active);
    }
}
