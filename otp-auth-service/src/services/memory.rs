//! In-process store.
//!
//! Used by tests and local runs without PostgreSQL. Every operation holds the
//! lock for its whole read-modify-write, which gives the same guarantees the
//! SQL statements give: one winner per consume and one identity per email.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::store::{HealthCheck, IdentityStore, OtpStore, StoreError};
use crate::models::{Identity, NewOtpRecord, OtpPurpose, OtpRecord};

#[derive(Default)]
struct Inner {
    next_otp_id: i64,
    otps: Vec<OtpRecord>,
    identities: HashMap<Uuid, Identity>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend(anyhow::anyhow!("memory store lock poisoned")))
    }

    /// Every record held for `email`, oldest first.
    pub fn records_for(&self, email: &str) -> Vec<OtpRecord> {
        self.lock()
            .map(|inner| {
                inner
                    .otps
                    .iter()
                    .filter(|r| r.email == email)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Move a record's expiry, for exercising expiry paths.
    pub fn set_expiry(&self, id: i64, expires_at: DateTime<Utc>) {
        if let Ok(mut inner) = self.lock() {
            if let Some(record) = inner.otps.iter_mut().find(|r| r.id == id) {
                record.expires_at = expires_at;
            }
        }
    }

    pub fn identity_count(&self) -> usize {
        self.lock().map(|inner| inner.identities.len()).unwrap_or(0)
    }

    pub fn otp_count(&self) -> usize {
        self.lock().map(|inner| inner.otps.len()).unwrap_or(0)
    }
}

#[async_trait]
impl HealthCheck for MemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }
}

#[async_trait]
impl OtpStore for MemoryStore {
    async fn insert_otp(&self, record: NewOtpRecord) -> Result<OtpRecord, StoreError> {
        let mut inner = self.lock()?;
        inner.next_otp_id += 1;
        let stored = OtpRecord {
            id: inner.next_otp_id,
            email: record.email,
            code_hash: record.code_hash,
            purpose: record.purpose.as_str().to_string(),
            expires_at: record.expires_at,
            created_at: record.created_at,
            consumed: false,
            consumed_at: None,
        };
        inner.otps.push(stored.clone());
        Ok(stored)
    }

    async fn find_latest_pending(
        &self,
        email: &str,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> Result<Option<OtpRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .otps
            .iter()
            .filter(|r| r.email == email && r.purpose == purpose.as_str() && r.is_eligible(now))
            .max_by_key(|r| (r.created_at, r.id))
            .cloned())
    }

    async fn consume_otp(&self, id: i64, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        match inner.otps.iter_mut().find(|r| r.id == id) {
            Some(record) if record.is_eligible(now) => {
                record.consumed = true;
                record.consumed_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn invalidate_pending(
        &self,
        email: &str,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut inner = self.lock()?;
        let mut changed = 0;
        for record in inner
            .otps
            .iter_mut()
            .filter(|r| r.email == email && r.purpose == purpose.as_str() && r.is_eligible(now))
        {
            record.consumed = true;
            record.consumed_at = Some(now);
            changed += 1;
        }
        Ok(changed)
    }

    async fn count_issued_since(
        &self,
        email: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .otps
            .iter()
            .filter(|r| r.email == email && r.created_at >= since)
            .count() as i64)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.lock()?;
        let before = inner.otps.len();
        inner.otps.retain(|r| r.expires_at >= now);
        Ok((before - inner.otps.len()) as u64)
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_identity_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        Ok(self.lock()?.identities.get(&id).cloned())
    }

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self
            .lock()?
            .identities
            .values()
            .find(|i| i.email == email)
            .cloned())
    }

    async fn insert_identity(&self, identity: &Identity) -> Result<Identity, StoreError> {
        let mut inner = self.lock()?;
        if inner
            .identities
            .values()
            .any(|i| i.email == identity.email || i.id == identity.id)
        {
            return Err(StoreError::UniqueViolation);
        }
        inner.identities.insert(identity.id, identity.clone());
        Ok(identity.clone())
    }

    async fn record_login(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>, StoreError> {
        let mut inner = self.lock()?;
        Ok(inner
            .identities
            .get_mut(&id)
            .filter(|identity| identity.is_active)
            .map(|identity| {
                identity.last_login_at = Some(now);
                identity.updated_at = now;
                identity.email_verified = true;
                identity.clone()
            }))
    }

    async fn deactivate_identity(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        match inner.identities.get_mut(&id) {
            Some(identity) => {
                identity.is_active = false;
                identity.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
