use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::AuthError;
use crate::config::SessionConfig;
use crate::models::Identity;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (identity ID)
    pub sub: String,
    pub email: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub iss: String,
    /// Token ID
    pub jti: String,
}

impl SessionClaims {
    pub fn identity_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

#[derive(Debug, Clone)]
pub struct SessionToken {
    pub token: String,
    pub claims: SessionClaims,
    /// Lifetime in seconds.
    pub expires_in: i64,
}

/// Signs and checks HS256 session tokens. No revocation list is kept.
#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    issuer: String,
}

impl SessionIssuer {
    pub fn new(config: &SessionConfig) -> Self {
        tracing::info!(ttl_days = config.ttl_days, "Session issuer initialized with HS256 key");
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            ttl: Duration::days(config.ttl_days),
            issuer: config.issuer.clone(),
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub fn issue(&self, identity: &Identity, now: DateTime<Utc>) -> Result<SessionToken, AuthError> {
        let claims = SessionClaims {
            sub: identity.id.to_string(),
            email: identity.email.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        Ok(SessionToken {
            token,
            claims,
            expires_in: self.ttl_seconds(),
        })
    }

    /// Check signature, issuer and expiry against `now`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the supplied clock below.
        validation.validate_exp = false;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        let claims = decode::<SessionClaims>(token, &self.decoding_key, &validation)?.claims;

        if claims.exp <= now.timestamp() {
            return Err(AuthError::Session(ErrorKind::ExpiredSignature.into()));
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: &str) -> SessionConfig {
        SessionConfig {
            secret: secret.to_string(),
            ttl_days: 30,
            issuer: "otp-auth-service".to_string(),
        }
    }

    fn identity() -> Identity {
        Identity::verified("a@x.com".to_string(), Utc::now())
    }

    #[test]
    fn issued_token_carries_identity() {
        let sessions = SessionIssuer::new(&config("a-very-long-test-secret-of-32-bytes!"));
        let identity = identity();
        let now = Utc::now();

        let session = sessions.issue(&identity, now).unwrap();
        let claims = sessions.verify(&session.token, now).unwrap();

        assert_eq!(claims.identity_id(), Some(identity.id));
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.iat, now.timestamp());
        assert_eq!(claims.exp - claims.iat, 30 * 24 * 3600);
        assert_eq!(session.expires_in, 30 * 24 * 3600);
        assert_eq!(claims, session.claims);
    }

    #[test]
    fn token_expires_after_ttl() {
        let sessions = SessionIssuer::new(&config("a-very-long-test-secret-of-32-bytes!"));
        let now = Utc::now();
        let session = sessions.issue(&identity(), now).unwrap();

        assert!(sessions.verify(&session.token, now + Duration::days(29)).is_ok());
        let err = sessions
            .verify(&session.token, now + Duration::days(30))
            .unwrap_err();
        assert!(matches!(err, AuthError::Session(_)));
    }

    #[test]
    fn token_from_other_key_is_rejected() {
        let ours = SessionIssuer::new(&config("a-very-long-test-secret-of-32-bytes!"));
        let theirs = SessionIssuer::new(&config("another-secret-that-is-also-32-bytes"));
        let now = Utc::now();

        let token = theirs.issue(&identity(), now).unwrap().token;
        assert!(ours.verify(&token, now).is_err());
        assert!(ours.verify("not.a.token", now).is_err());
    }

    #[test]
    fn each_token_has_unique_id() {
        let sessions = SessionIssuer::new(&config("a-very-long-test-secret-of-32-bytes!"));
        let identity = identity();
        let now = Utc::now();

        let a = sessions.issue(&identity, now).unwrap();
        let b = sessions.issue(&identity, now).unwrap();
        assert_ne!(a.claims.jti, b.claims.jti);
    }
}
