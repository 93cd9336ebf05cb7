//! Principal model and the user directory seam
//!
//! The principal record is owned by an external user directory; this crate
//! only reads identity facts from it and mutates two things: the stored
//! credential pair (refresh token plus expiry) and a small set of string
//! attributes the OTP engine uses as ephemeral scratch space.
//!
//! | Field                      | Type               | Description                                          |
//! | -------------------------- | ------------------ | ---------------------------------------------------- |
//! | `id`                       | `PrincipalId`      | The unique identifier for the principal.             |
//! | `name`                     | `String`           | The display/login name of the principal.             |
//! | `email`                    | `String`           | The email address, used as a secondary lookup key.   |
//! | `email_confirmed_at`       | `Option<DateTime>` | When the email was confirmed, if ever.               |
//! | `two_factor_enabled`       | `bool`             | Whether logins require a second factor.              |
//! | `locked_at`                | `Option<DateTime>` | When the account was locked out, if it is.           |
//! | `refresh_token`            | `Option<String>`   | The active opaque refresh token, if any.             |
//! | `refresh_token_expires_at` | `Option<DateTime>` | Expiry of the active refresh token.                  |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    error::ValidationError,
    id::{generate_prefixed_id, validate_prefixed_id},
};

/// A unique, stable identifier for a specific principal
///
/// This value should be treated as opaque; the external directory decides
/// its actual shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct PrincipalId(String);

impl PrincipalId {
    pub fn new(id: &str) -> Self {
        PrincipalId(id.to_string())
    }

    pub fn new_random() -> Self {
        PrincipalId(generate_prefixed_id("usr"))
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate that this ID has the prefixed format used by the built-in generator
    pub fn is_valid(&self) -> bool {
        validate_prefixed_id(&self.0, "usr")
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new_random()
    }
}

impl From<String> for PrincipalId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PrincipalId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The identity record the subsystem operates against
///
/// At most one credential pair exists per principal at any time; writing a
/// new one always supersedes the prior one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// The unique identifier for the principal.
    pub id: PrincipalId,

    /// The display/login name of the principal.
    pub name: String,

    /// The email address of the principal.
    pub email: String,

    /// When the email address was confirmed. None means never.
    pub email_confirmed_at: Option<DateTime<Utc>>,

    /// Whether logins for this principal require a second factor.
    pub two_factor_enabled: bool,

    /// When the account was locked out. None means not locked.
    pub locked_at: Option<DateTime<Utc>>,

    /// The active opaque refresh token, overwritten on every rotation.
    pub refresh_token: Option<String>,

    /// Expiry of the active refresh token.
    pub refresh_token_expires_at: Option<DateTime<Utc>>,

    /// The timestamp when the principal was created.
    pub created_at: DateTime<Utc>,

    /// The timestamp when the principal was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Principal {
    pub fn builder() -> PrincipalBuilder {
        PrincipalBuilder::default()
    }

    /// Check if the principal's email has been confirmed.
    pub fn is_email_confirmed(&self) -> bool {
        self.email_confirmed_at.is_some()
    }

    /// Check whether the stored credential pair matches and is still valid.
    pub fn has_valid_refresh_token(&self, submitted: &str, now: DateTime<Utc>) -> bool {
        match (&self.refresh_token, self.refresh_token_expires_at) {
            (Some(stored), Some(expires_at)) => stored == submitted && expires_at > now,
            _ => false,
        }
    }

    /// Overwrite the credential pair. The previous pair, if any, is superseded.
    pub fn set_refresh_token(&mut self, token: String, expires_at: DateTime<Utc>) {
        self.refresh_token = Some(token);
        self.refresh_token_expires_at = Some(expires_at);
    }

    /// Drop the credential pair entirely.
    pub fn clear_refresh_token(&mut self) {
        self.refresh_token = None;
        self.refresh_token_expires_at = None;
    }
}

#[derive(Default)]
pub struct PrincipalBuilder {
    id: Option<PrincipalId>,
    name: Option<String>,
    email: Option<String>,
    email_confirmed_at: Option<DateTime<Utc>>,
    two_factor_enabled: bool,
    locked_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl PrincipalBuilder {
    pub fn id(mut self, id: PrincipalId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn email_confirmed_at(mut self, email_confirmed_at: Option<DateTime<Utc>>) -> Self {
        self.email_confirmed_at = email_confirmed_at;
        self
    }

    pub fn two_factor_enabled(mut self, two_factor_enabled: bool) -> Self {
        self.two_factor_enabled = two_factor_enabled;
        self
    }

    pub fn locked_at(mut self, locked_at: Option<DateTime<Utc>>) -> Self {
        self.locked_at = locked_at;
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    pub fn build(self) -> Result<Principal, Error> {
        let now = Utc::now();
        Ok(Principal {
            id: self.id.unwrap_or_default(),
            name: self.name.ok_or(ValidationError::MissingField(
                "Name is required".to_string(),
            ))?,
            email: self.email.ok_or(ValidationError::MissingField(
                "Email is required".to_string(),
            ))?,
            email_confirmed_at: self.email_confirmed_at,
            two_factor_enabled: self.two_factor_enabled,
            locked_at: self.locked_at,
            refresh_token: None,
            refresh_token_expires_at: None,
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
        })
    }
}

/// The external user directory the subsystem consults for identity facts
///
/// Implementations own persistence of the principal record, password
/// verification, role assignment, and an open-ended string attribute map.
/// Everything here may block on I/O; no call requires a lock to be held
/// across it.
#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    /// Find a principal by ID
    async fn find_by_id(&self, id: &PrincipalId) -> Result<Option<Principal>, Error>;

    /// Find a principal by email address
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, Error>;

    /// Find a principal by display/login name
    async fn find_by_name(&self, name: &str) -> Result<Option<Principal>, Error>;

    /// Verify a plaintext password against the stored credential
    async fn check_password(&self, id: &PrincipalId, password: &str) -> Result<bool, Error>;

    /// Replace the stored password credential
    async fn set_password(&self, id: &PrincipalId, new_password: &str) -> Result<(), Error>;

    /// Whether the account is currently locked out
    async fn is_locked_out(&self, id: &PrincipalId) -> Result<bool, Error>;

    /// Role names assigned to the principal
    async fn roles(&self, id: &PrincipalId) -> Result<Vec<String>, Error>;

    /// Read a per-principal string attribute
    async fn get_attribute(&self, id: &PrincipalId, key: &str) -> Result<Option<String>, Error>;

    /// Write a per-principal string attribute, overwriting any prior value
    async fn set_attribute(&self, id: &PrincipalId, key: &str, value: &str) -> Result<(), Error>;

    /// Remove a per-principal string attribute, if present
    async fn remove_attribute(&self, id: &PrincipalId, key: &str) -> Result<(), Error>;

    /// Persist changes to the principal record
    async fn update(&self, principal: &Principal) -> Result<Principal, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_principal_id() {
        let id = PrincipalId::new("test");
        assert_eq!(id.as_str(), "test");

        let from_str = PrincipalId::from(id.as_str());
        assert_eq!(from_str, id);

        let random = PrincipalId::new_random();
        assert!(random.as_str().starts_with("usr_"));
        assert!(random.is_valid());
        assert_ne!(random, PrincipalId::new_random());

        assert!(!PrincipalId::new("invalid").is_valid());
    }

    #[test]
    fn test_principal_builder_requires_identity_fields() {
        let result = Principal::builder().email("a@example.com").build();
        assert!(result.is_err());

        let result = Principal::builder().name("alice").build();
        assert!(result.is_err());

        let principal = Principal::builder()
            .name("alice")
            .email("a@example.com")
            .build()
            .unwrap();
        assert!(!principal.two_factor_enabled);
        assert!(!principal.is_email_confirmed());
        assert!(principal.refresh_token.is_none());
    }

    #[test]
    fn test_refresh_token_pair() {
        let mut principal = Principal::builder()
            .name("alice")
            .email("a@example.com")
            .build()
            .unwrap();

        let now = Utc::now();
        assert!(!principal.has_valid_refresh_token("tok", now));

        principal.set_refresh_token("tok".to_string(), now + Duration::days(1));
        assert!(principal.has_valid_refresh_token("tok", now));
        assert!(!principal.has_valid_refresh_token("other", now));

        // Expired pair never matches
        principal.set_refresh_token("tok".to_string(), now - Duration::seconds(1));
        assert!(!principal.has_valid_refresh_token("tok", now));

        principal.clear_refresh_token();
        assert!(principal.refresh_token.is_none());
        assert!(principal.refresh_token_expires_at.is_none());
    }
}
