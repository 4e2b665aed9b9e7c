use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::error::AuthError;
use super::store::{IdentityStore, StoreError};
use crate::models::Identity;

/// Result of resolving a verified email.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub identity: Identity,
    pub created: bool,
}

/// Creates an identity on first verification and reuses it afterwards.
#[derive(Clone)]
pub struct IdentityProvisioner {
    store: Arc<dyn IdentityStore>,
}

impl IdentityProvisioner {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AuthError> {
        Ok(self.store.find_identity_by_email(email).await?)
    }

    /// Fetch-or-create the identity for a verified, normalized email.
    ///
    /// A concurrent creator losing on the unique email index re-reads the
    /// winner's row instead of failing.
    #[tracing::instrument(skip(self, email))]
    pub async fn resolve(&self, email: &str, now: DateTime<Utc>) -> Result<Resolved, AuthError> {
        if let Some(existing) = self.store.find_identity_by_email(email).await? {
            return self.touch(existing, now).await;
        }

        match self.create(email, now).await {
            Err(AuthError::ConflictRetry) => {
                tracing::info!("Identity created concurrently, reusing it");
                metrics::counter!("identity_create_conflicts_total").increment(1);
                let winner = self
                    .store
                    .find_identity_by_email(email)
                    .await?
                    .ok_or(AuthError::ConflictRetry)?;
                self.touch(winner, now).await
            }
            other => other,
        }
    }

    async fn create(&self, email: &str, now: DateTime<Utc>) -> Result<Resolved, AuthError> {
        let identity = Identity::verified(email.to_string(), now);
        match self.store.insert_identity(&identity).await {
            Ok(identity) => {
                metrics::counter!("identities_created_total").increment(1);
                tracing::info!(identity_id = %identity.id, "Identity created");
                Ok(Resolved {
                    identity,
                    created: true,
                })
            }
            Err(StoreError::UniqueViolation) => Err(AuthError::ConflictRetry),
            Err(e) => Err(e.into()),
        }
    }

    /// The store refuses disabled identities in the same write, so a soft
    /// delete racing this call cannot slip through.
    async fn touch(&self, identity: Identity, now: DateTime<Utc>) -> Result<Resolved, AuthError> {
        let Some(identity) = self.store.record_login(identity.id, now).await? else {
            tracing::warn!(identity_id = %identity.id, "Sign-in refused for disabled identity");
            return Err(AuthError::AccountDisabled);
        };
        Ok(Resolved {
            identity,
            created: false,
        })
    }
}
