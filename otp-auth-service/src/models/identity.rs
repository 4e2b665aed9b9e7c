//! Identity model - one authenticated end user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Identity entity.
///
/// Created exactly once per email, on the first successful code verification.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Identity {
    pub id: Uuid,
    /// Normalized (trimmed, lower-cased) address; unique across identities.
    pub email: String,
    pub email_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl Identity {
    /// Build the identity minted by a first successful verification.
    pub fn verified(email: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            email_verified: true,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login_at: Some(now),
        }
    }

    /// Convert to the attributes clients are allowed to see.
    pub fn public(&self) -> PublicIdentity {
        PublicIdentity::from(self)
    }
}

/// Identity attributes returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublicIdentity {
    pub id: Uuid,
    #[schema(example = "user@example.com")]
    pub email: String,
    pub email_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<&Identity> for PublicIdentity {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            email: identity.email.clone(),
            email_verified: identity.email_verified,
            is_active: identity.is_active,
            created_at: identity.created_at,
            last_login_at: identity.last_login_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verified_identity_starts_active_and_verified() {
        let now = Utc::now();
        let identity = Identity::verified("a@x.com".to_string(), now);

        assert!(identity.email_verified);
        assert!(identity.is_active);
        assert_eq!(identity.created_at, now);
        assert_eq!(identity.last_login_at, Some(now));
    }

    #[test]
    fn identifiers_are_unique() {
        let now = Utc::now();
        let a = Identity::verified("a@x.com".to_string(), now);
        let b = Identity::verified("a@x.com".to_string(), now);
        assert_ne!(a.id, b.id);
    }
}
