//! Shared test doubles for the integration suite
//!
//! The external collaborators are hand-rolled async mocks: a HashMap-backed
//! user directory with plaintext password comparison, a recording mailer,
//! and a revocation store wrapper that counts write calls so tests can
//! assert which revocation granularity a flow used.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use wicket::{
    AuthConfig, EmailMessage, Error, MailSender, MemoryRevocationStore, Principal, PrincipalId,
    RevocationStore, StorageError, Wicket,
};

pub const TEST_SECRET: &[u8] = b"integration_test_secret_for_hs256_tokens_only!!";

#[derive(Default)]
pub struct MemoryDirectory {
    principals: Mutex<HashMap<PrincipalId, Principal>>,
    passwords: Mutex<HashMap<PrincipalId, String>>,
    roles: Mutex<HashMap<PrincipalId, Vec<String>>>,
    attributes: Mutex<HashMap<(PrincipalId, String), String>>,
}

impl MemoryDirectory {
    pub async fn insert(&self, principal: Principal, password: &str) {
        self.passwords
            .lock()
            .await
            .insert(principal.id.clone(), password.to_string());
        self.principals
            .lock()
            .await
            .insert(principal.id.clone(), principal);
    }

    pub async fn get(&self, id: &PrincipalId) -> Principal {
        self.principals.lock().await.get(id).cloned().unwrap()
    }

    pub async fn set_roles(&self, id: &PrincipalId, roles: Vec<String>) {
        self.roles.lock().await.insert(id.clone(), roles);
    }

    pub async fn lock_out(&self, id: &PrincipalId) {
        let mut principals = self.principals.lock().await;
        if let Some(principal) = principals.get_mut(id) {
            principal.locked_at = Some(Utc::now());
        }
    }

    pub async fn attribute(&self, id: &PrincipalId, key: &str) -> Option<String> {
        self.attributes
            .lock()
            .await
            .get(&(id.clone(), key.to_string()))
            .cloned()
    }
}

#[async_trait]
impl wicket::UserDirectory for MemoryDirectory {
    async fn find_by_id(&self, id: &PrincipalId) -> Result<Option<Principal>, Error> {
        Ok(self.principals.lock().await.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, Error> {
        Ok(self
            .principals
            .lock()
            .await
            .values()
            .find(|p| p.email == email)
            .cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Principal>, Error> {
        Ok(self
            .principals
            .lock()
            .await
            .values()
            .find(|p| p.name == name)
            .cloned())
    }

    async fn check_password(&self, id: &PrincipalId, password: &str) -> Result<bool, Error> {
        Ok(self.passwords.lock().await.get(id).map(String::as_str) == Some(password))
    }

    async fn set_password(&self, id: &PrincipalId, new_password: &str) -> Result<(), Error> {
        self.passwords
            .lock()
            .await
            .insert(id.clone(), new_password.to_string());
        Ok(())
    }

    async fn is_locked_out(&self, id: &PrincipalId) -> Result<bool, Error> {
        Ok(self
            .principals
            .lock()
            .await
            .get(id)
            .is_some_and(|p| p.locked_at.is_some()))
    }

    async fn roles(&self, id: &PrincipalId) -> Result<Vec<String>, Error> {
        Ok(self.roles.lock().await.get(id).cloned().unwrap_or_default())
    }

    async fn get_attribute(&self, id: &PrincipalId, key: &str) -> Result<Option<String>, Error> {
        Ok(self.attribute(id, key).await)
    }

    async fn set_attribute(&self, id: &PrincipalId, key: &str, value: &str) -> Result<(), Error> {
        self.attributes
            .lock()
            .await
            .insert((id.clone(), key.to_string()), value.to_string());
        Ok(())
    }

    async fn remove_attribute(&self, id: &PrincipalId, key: &str) -> Result<(), Error> {
        self.attributes
            .lock()
            .await
            .remove(&(id.clone(), key.to_string()));
        Ok(())
    }

    async fn update(&self, principal: &Principal) -> Result<Principal, Error> {
        let mut updated = principal.clone();
        updated.updated_at = Utc::now();
        self.principals
            .lock()
            .await
            .insert(updated.id.clone(), updated.clone());
        Ok(updated)
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }

    /// The passcode carried by the most recent message
    pub async fn last_code(&self) -> String {
        let sent = self.sent.lock().await;
        let body = &sent.last().expect("no email was sent").body;
        body.chars().filter(|c| c.is_ascii_digit()).collect()
    }
}

#[async_trait]
impl MailSender for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), Error> {
        self.sent.lock().await.push(message);
        Ok(())
    }
}

/// Counts revocation writes on top of the in-memory store
#[derive(Default)]
pub struct CountingRevocationStore {
    inner: MemoryRevocationStore,
    pub blacklist_token_calls: AtomicUsize,
    pub blacklist_all_calls: AtomicUsize,
    pub blacklist_all_except_calls: AtomicUsize,
}

#[async_trait]
impl RevocationStore for CountingRevocationStore {
    async fn blacklist_token(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), Error> {
        self.blacklist_token_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.blacklist_token(token, expires_at).await
    }

    async fn is_blacklisted(&self, token: &str) -> Result<bool, Error> {
        self.inner.is_blacklisted(token).await
    }

    async fn blacklist_all_for_user(&self, user_id: &PrincipalId) -> Result<(), Error> {
        self.blacklist_all_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.blacklist_all_for_user(user_id).await
    }

    async fn blacklist_all_for_user_except(
        &self,
        user_id: &PrincipalId,
        keep_token: &str,
    ) -> Result<(), Error> {
        self.blacklist_all_except_calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .blacklist_all_for_user_except(user_id, keep_token)
            .await
    }

    async fn are_user_tokens_invalidated(
        &self,
        user_id: &PrincipalId,
        issued_at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        self.inner.are_user_tokens_invalidated(user_id, issued_at).await
    }

    async fn exception_token(&self, user_id: &PrincipalId) -> Result<Option<String>, Error> {
        self.inner.exception_token(user_id).await
    }
}

/// Simulates a revocation store outage on the read or write side
///
/// Healthy operations delegate to the in-memory store, so state written
/// before the outage stays observable.
#[derive(Default)]
pub struct OutageRevocationStore {
    inner: MemoryRevocationStore,
    fail_reads: bool,
    fail_writes: bool,
}

impl OutageRevocationStore {
    pub fn failing_reads() -> Self {
        Self {
            fail_reads: true,
            ..Default::default()
        }
    }

    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Default::default()
        }
    }

    fn outage() -> Error {
        StorageError::Connection("revocation store unreachable".to_string()).into()
    }
}

#[async_trait]
impl RevocationStore for OutageRevocationStore {
    async fn blacklist_token(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), Error> {
        if self.fail_writes {
            return Err(Self::outage());
        }
        self.inner.blacklist_token(token, expires_at).await
    }

    async fn is_blacklisted(&self, token: &str) -> Result<bool, Error> {
        if self.fail_reads {
            return Err(Self::outage());
        }
        self.inner.is_blacklisted(token).await
    }

    async fn blacklist_all_for_user(&self, user_id: &PrincipalId) -> Result<(), Error> {
        if self.fail_writes {
            return Err(Self::outage());
        }
        self.inner.blacklist_all_for_user(user_id).await
    }

    async fn blacklist_all_for_user_except(
        &self,
        user_id: &PrincipalId,
        keep_token: &str,
    ) -> Result<(), Error> {
        if self.fail_writes {
            return Err(Self::outage());
        }
        self.inner
            .blacklist_all_for_user_except(user_id, keep_token)
            .await
    }

    async fn are_user_tokens_invalidated(
        &self,
        user_id: &PrincipalId,
        issued_at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        if self.fail_reads {
            return Err(Self::outage());
        }
        self.inner.are_user_tokens_invalidated(user_id, issued_at).await
    }

    async fn exception_token(&self, user_id: &PrincipalId) -> Result<Option<String>, Error> {
        if self.fail_reads {
            return Err(Self::outage());
        }
        self.inner.exception_token(user_id).await
    }
}

pub struct Harness {
    pub directory: Arc<MemoryDirectory>,
    pub revocation: Arc<CountingRevocationStore>,
    pub mailer: Arc<RecordingMailer>,
    pub wicket: Wicket<MemoryDirectory, CountingRevocationStore, RecordingMailer>,
}

pub fn default_config() -> AuthConfig {
    AuthConfig::new(TEST_SECRET.to_vec())
        .unwrap()
        .with_issuer("wicket-tests")
}

pub fn harness(config: AuthConfig) -> Harness {
    let directory = Arc::new(MemoryDirectory::default());
    let revocation = Arc::new(CountingRevocationStore::default());
    let mailer = Arc::new(RecordingMailer::default());
    let wicket = Wicket::new(
        directory.clone(),
        revocation.clone(),
        mailer.clone(),
        config,
    );

    Harness {
        directory,
        revocation,
        mailer,
        wicket,
    }
}

impl Harness {
    /// Seed a confirmed principal with the given password
    pub async fn seed_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
        two_factor: bool,
    ) -> Principal {
        let principal = Principal::builder()
            .name(name)
            .email(email)
            .email_confirmed_at(Some(Utc::now()))
            .two_factor_enabled(two_factor)
            .build()
            .unwrap();
        self.directory.insert(principal.clone(), password).await;
        principal
    }

    /// Seed a principal whose email was never confirmed
    pub async fn seed_unconfirmed_user(&self, name: &str, email: &str, password: &str) -> Principal {
        let principal = Principal::builder()
            .name(name)
            .email(email)
            .build()
            .unwrap();
        self.directory.insert(principal.clone(), password).await;
        principal
    }
}
