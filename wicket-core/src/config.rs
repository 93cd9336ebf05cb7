//! Subsystem configuration
//!
//! All tunables are injected at construction time and validated once.
//! Nothing in the crate reads ambient global state at call time.

use chrono::Duration;

use crate::{Error, error::ValidationError};

/// Minimum signing secret length in bytes for the HMAC-SHA256 family.
pub const MIN_SECRET_LEN: usize = 32;

/// Configuration for the session and token lifecycle subsystem
///
/// The signing secret is validated in [`AuthConfig::new`]; a missing or
/// too-short secret is a fatal configuration error raised at startup,
/// never per-request.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    secret: Vec<u8>,
    /// Issuer claim embedded in and required of every access token
    pub issuer: Option<String>,
    /// Lifetime of a signed access token
    pub access_token_ttl: Duration,
    /// Lifetime of the opaque refresh token stored alongside the principal
    pub refresh_token_ttl: Duration,
    /// How long an issued one-time passcode stays valid
    pub otp_lifespan: Duration,
    /// Minimum time between successive passcode issuances to the same user
    pub otp_throttle: Duration,
}

impl AuthConfig {
    /// Create a configuration with the given HS256 signing secret
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, Error> {
        let secret = secret.into();
        if secret.len() < MIN_SECRET_LEN {
            return Err(ValidationError::SecretTooShort {
                actual: secret.len(),
                required: MIN_SECRET_LEN,
            }
            .into());
        }

        Ok(Self {
            secret,
            issuer: None,
            access_token_ttl: Duration::minutes(15),
            refresh_token_ttl: Duration::days(7),
            otp_lifespan: Duration::seconds(120),
            otp_throttle: Duration::seconds(60),
        })
    }

    /// Set the issuer claim
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Set the access token lifetime
    pub fn with_access_token_ttl(mut self, ttl: Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }

    /// Set the refresh token lifetime
    pub fn with_refresh_token_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_token_ttl = ttl;
        self
    }

    /// Set the one-time passcode lifespan
    pub fn with_otp_lifespan(mut self, lifespan: Duration) -> Self {
        self.otp_lifespan = lifespan;
        self
    }

    /// Set the one-time passcode resend throttle window
    pub fn with_otp_throttle(mut self, throttle: Duration) -> Self {
        self.otp_throttle = throttle;
        self
    }

    /// The raw signing secret
    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    /// Create a configuration with a random secret (for testing)
    #[cfg(test)]
    pub fn new_random() -> Self {
        use rand::{TryRngCore, rngs::OsRng};

        let mut secret = vec![0u8; MIN_SECRET_LEN];
        OsRng.try_fill_bytes(&mut secret).unwrap();
        Self::new(secret).unwrap()
    }
}
