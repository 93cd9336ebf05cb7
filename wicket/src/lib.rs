//! # Wicket
//!
//! Wicket is a session and token lifecycle library for Rust applications:
//! it issues, rotates, revokes, and re-validates authentication
//! credentials, and runs the one-time-passcode challenge flow gating
//! second-factor logins.
//!
//! Wicket deliberately does NOT own user storage or email delivery. You
//! bring a [`UserDirectory`] (your user store), a [`RevocationStore`] (a
//! shared TTL key-value store; the bundled [`MemoryRevocationStore`] works
//! for tests and single-instance deployments), and a [`MailSender`], and
//! Wicket coordinates the lifecycle on top of them:
//!
//! - Short-lived signed access tokens (HS256) plus long-lived opaque
//!   refresh tokens, rotated as a pair and single-use per rotation
//! - Three revocation granularities: one token, all of a user's tokens,
//!   all of a user's tokens except one
//! - Six-digit OTP challenges with resend throttling for login second
//!   factor and for confirming second-factor changes
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wicket::{AuthConfig, MemoryRevocationStore, Wicket};
//!
//! let config = AuthConfig::new(signing_secret)?.with_issuer("my-app");
//! let wicket = Wicket::new(
//!     Arc::new(my_directory),
//!     Arc::new(MemoryRevocationStore::new()),
//!     Arc::new(my_mailer),
//!     config,
//! );
//!
//! let tokens = wicket.login("user@example.com", "hunter2!").await?;
//! if tokens.requires_two_factor {
//!     // prompt for the emailed code, then wicket.verify_otp(...)
//! }
//! ```

use std::sync::Arc;

use wicket_core::services::SessionService;

/// Re-export core types
///
/// These types are commonly used when working with the Wicket API.
pub use wicket_core::{
    AccessClaims, AuthConfig, Error, MemoryRevocationStore, Principal, PrincipalId,
    RevocationStore, TokenCodec, UserDirectory,
    error::{AuthError, OtpError, StorageError, TokenError},
    mailer::{EmailMessage, MailSender},
    services::{AuthTokens, PasswordChangeBehavior},
};

/// The main entry point, wiring a user directory, a revocation store, and
/// a mail sender behind the session orchestrator
pub struct Wicket<D, R, M>
where
    D: UserDirectory,
    R: RevocationStore,
    M: MailSender,
{
    sessions: SessionService<D, R, M>,
}

impl<D, R, M> Wicket<D, R, M>
where
    D: UserDirectory,
    R: RevocationStore,
    M: MailSender,
{
    /// Create a new Wicket instance from a validated configuration
    pub fn new(directory: Arc<D>, revocation: Arc<R>, mailer: Arc<M>, config: AuthConfig) -> Self {
        Self {
            sessions: SessionService::new(directory, revocation, mailer, config),
        }
    }

    /// Authenticate with email and password
    ///
    /// Returns issued tokens, or a `requires_two_factor` response when the
    /// principal must answer an OTP challenge first.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthTokens, Error> {
        self.sessions.login(email, password).await
    }

    /// Complete a second-factor login with the emailed passcode
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<AuthTokens, Error> {
        self.sessions.verify_otp(email, code).await
    }

    /// Exchange an access/refresh token pair for a fresh one
    ///
    /// The access token may be expired; its signature still must verify.
    pub async fn refresh(&self, access_token: &str, refresh_token: &str) -> Result<AuthTokens, Error> {
        self.sessions.refresh(access_token, refresh_token).await
    }

    /// End a session; best-effort, never fails the caller
    pub async fn logout(&self, user_id: &PrincipalId, access_token: &str) -> Result<(), Error> {
        self.sessions.logout(user_id, access_token).await
    }

    /// Change the password, revoking sessions per `behavior`
    pub async fn change_password(
        &self,
        user_id: &PrincipalId,
        current_password: &str,
        new_password: &str,
        behavior: PasswordChangeBehavior,
        current_access_token: Option<&str>,
    ) -> Result<(), Error> {
        self.sessions
            .change_password(
                user_id,
                current_password,
                new_password,
                behavior,
                current_access_token,
            )
            .await
    }

    /// Start enabling or disabling the second factor
    pub async fn request_two_factor_change(
        &self,
        user_id: &PrincipalId,
        password: &str,
        enable: bool,
    ) -> Result<(), Error> {
        self.sessions
            .request_two_factor_change(user_id, password, enable)
            .await
    }

    /// Confirm a second-factor change with the emailed passcode
    pub async fn confirm_two_factor_change(
        &self,
        user_id: &PrincipalId,
        code: &str,
        enable: bool,
    ) -> Result<(), Error> {
        self.sessions
            .confirm_two_factor_change(user_id, code, enable)
            .await
    }

    /// Void every token the user holds across all sessions
    pub async fn invalidate_all_user_tokens(&self, user_id: &PrincipalId) -> Result<(), Error> {
        self.sessions.invalidate_all_user_tokens(user_id).await
    }

    /// Re-validate a presented access token
    ///
    /// Full validation: signature, algorithm, expiry, blacklist, and the
    /// user's invalidation watermark.
    pub async fn validate_access_token(&self, access_token: &str) -> Result<AccessClaims, Error> {
        self.sessions.validate_access_token(access_token).await
    }
}
