//! In-process revocation store
//!
//! A TTL key-value store over a [`DashMap`], shaped like the external
//! stores (Redis and friends) that back production deployments: string
//! keys, string values, per-entry expiry, lazy removal on read. Suitable
//! for tests and single-instance deployments; horizontally scaled
//! deployments need a shared store behind the same trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::{Error, PrincipalId};

use super::{RevocationStore, blacklist_key, exception_key, watermark_key};

const BLACKLIST_SENTINEL: &str = "revoked";

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

/// TTL-capable in-memory revocation store
#[derive(Default)]
pub struct MemoryRevocationStore {
    entries: DashMap<String, Entry>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read an entry, removing it first if its TTL has elapsed.
    fn get_live(&self, key: &str) -> Option<String> {
        let expired = match self.entries.get(key) {
            Some(entry) => match entry.expires_at {
                Some(expires_at) => expires_at <= Utc::now(),
                None => false,
            },
            None => return None,
        };

        if expired {
            self.entries.remove(key);
            return None;
        }

        self.entries.get(key).map(|entry| entry.value.clone())
    }

    fn put(&self, key: String, value: String, expires_at: Option<DateTime<Utc>>) {
        self.entries.insert(key, Entry { value, expires_at });
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn blacklist_token(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), Error> {
        // Already expired: nothing to track
        if expires_at <= Utc::now() {
            return Ok(());
        }

        self.put(
            blacklist_key(token),
            BLACKLIST_SENTINEL.to_string(),
            Some(expires_at),
        );
        Ok(())
    }

    async fn is_blacklisted(&self, token: &str) -> Result<bool, Error> {
        Ok(self.get_live(&blacklist_key(token)).is_some())
    }

    async fn blacklist_all_for_user(&self, user_id: &PrincipalId) -> Result<(), Error> {
        self.put(
            watermark_key(user_id),
            Utc::now().timestamp().to_string(),
            None,
        );
        self.entries.remove(&exception_key(user_id));
        Ok(())
    }

    async fn blacklist_all_for_user_except(
        &self,
        user_id: &PrincipalId,
        keep_token: &str,
    ) -> Result<(), Error> {
        if keep_token.is_empty() {
            return self.blacklist_all_for_user(user_id).await;
        }

        self.put(
            watermark_key(user_id),
            Utc::now().timestamp().to_string(),
            None,
        );
        self.put(exception_key(user_id), keep_token.to_string(), None);
        Ok(())
    }

    async fn are_user_tokens_invalidated(
        &self,
        user_id: &PrincipalId,
        issued_at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let Some(raw) = self.get_live(&watermark_key(user_id)) else {
            return Ok(false);
        };

        match raw.parse::<i64>() {
            Ok(watermark) => Ok(issued_at.timestamp() < watermark),
            Err(_) => {
                // Corrupt watermark data: fail open rather than reject
                // every token the user holds.
                tracing::warn!(
                    user_id = %user_id,
                    value = %raw,
                    "malformed invalidation watermark, treating user tokens as not invalidated"
                );
                Ok(false)
            }
        }
    }

    async fn exception_token(&self, user_id: &PrincipalId) -> Result<Option<String>, Error> {
        Ok(self.get_live(&exception_key(user_id)))
    }
}
