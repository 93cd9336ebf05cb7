//! Session orchestration
//!
//! The state machine coordinating login, refresh, logout, password-change,
//! and second-factor flows. Each operation runs as an independent unit of
//! work; the revocation store is the only cross-request coordination point.
//!
//! Revocation reads here are fail-open: if the store is unreachable the
//! request proceeds as though nothing were revoked, and the failure is
//! logged. Revocation writes propagate, so callers can tell when a
//! revocation did not persist. See the `revocation` module docs for the
//! rationale behind the asymmetry.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::{
    AuthConfig, Error, Principal, PrincipalId, RevocationStore, TokenCodec, UserDirectory,
    error::{AuthError, OtpError, TokenError, ValidationError},
    id::generate_opaque_token,
    mailer::{EmailMessage, MailSender},
    otp::OtpEngine,
    token::AccessClaims,
};

/// What to do with the user's other sessions after a password change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordChangeBehavior {
    /// Leave every session untouched
    KeepAllSessions,
    /// Void every token except the access token used for the change
    LogoutOthersOnly,
    /// Void every token, including the current one
    LogoutAllIncludingCurrent,
}

/// Outcome of a login, OTP verification, or refresh
///
/// Either a full credential set, or a signal that a second factor is
/// required before tokens can be issued.
#[derive(Debug, Clone)]
pub struct AuthTokens {
    /// Signed access token; absent while a second factor is pending
    pub access_token: Option<String>,
    /// Opaque refresh token; absent while a second factor is pending
    pub refresh_token: Option<String>,
    /// Whether the caller must complete an OTP challenge next
    pub requires_two_factor: bool,
    /// Email the challenge was sent to, or the authenticated address
    pub email: String,
}

impl AuthTokens {
    fn issued(access_token: String, refresh_token: String, email: String) -> Self {
        Self {
            access_token: Some(access_token),
            refresh_token: Some(refresh_token),
            requires_two_factor: false,
            email,
        }
    }

    fn two_factor_pending(email: String) -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            requires_two_factor: true,
            email,
        }
    }
}

/// Orchestrates the session and token lifecycle
///
/// Generic over the three external seams: the user directory, the
/// revocation store, and the mail sender.
pub struct SessionService<D, R, M>
where
    D: UserDirectory,
    R: RevocationStore,
    M: MailSender,
{
    directory: Arc<D>,
    revocation: Arc<R>,
    mailer: Arc<M>,
    codec: TokenCodec,
    otp: OtpEngine<D>,
    refresh_token_ttl: Duration,
}

impl<D, R, M> SessionService<D, R, M>
where
    D: UserDirectory,
    R: RevocationStore,
    M: MailSender,
{
    /// Create a new SessionService from a validated configuration
    pub fn new(directory: Arc<D>, revocation: Arc<R>, mailer: Arc<M>, config: AuthConfig) -> Self {
        let codec = TokenCodec::new(&config);
        let otp = OtpEngine::new(directory.clone(), &config);
        Self {
            directory,
            revocation,
            mailer,
            codec,
            otp,
            refresh_token_ttl: config.refresh_token_ttl,
        }
    }

    /// Authenticate with email and password
    ///
    /// Issues a credential set directly, or starts an OTP challenge when
    /// the principal has a second factor enabled.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthTokens, Error> {
        let principal = self
            .directory
            .find_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !principal.is_email_confirmed() {
            return Err(AuthError::UserNotConfirmed.into());
        }

        if !self
            .directory
            .check_password(&principal.id, password)
            .await?
        {
            return Err(AuthError::InvalidCredentials.into());
        }

        if self.directory.is_locked_out(&principal.id).await? {
            return Err(AuthError::AccountLocked.into());
        }

        if principal.two_factor_enabled {
            self.otp.check_throttle(&principal).await?;
            let challenge = self.otp.issue(&principal).await?;
            self.send_code_email(&principal, &challenge.code).await;
            return Ok(AuthTokens::two_factor_pending(principal.email));
        }

        self.issue_tokens(principal).await
    }

    /// Complete a login by answering the pending OTP challenge
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<AuthTokens, Error> {
        let principal = self
            .directory
            .find_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !principal.two_factor_enabled {
            return Err(AuthError::TwoFactorNotEnabled.into());
        }

        if !self.otp.verify(&principal, code).await? {
            return Err(OtpError::InvalidOrExpired.into());
        }

        self.issue_tokens(principal).await
    }

    /// Exchange an access/refresh token pair for a fresh one
    ///
    /// The access token's signature must verify but its expiry is ignored;
    /// that is the entire point of this operation. The submitted refresh
    /// token must exactly match the stored credential pair, and the access
    /// token must not antedate the user's invalidation watermark unless it
    /// is the recorded exception token.
    pub async fn refresh(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<AuthTokens, Error> {
        let claims = self.codec.decode_expired(access_token)?;

        let principal = self
            .directory
            .find_by_name(&claims.name)
            .await?
            .ok_or_else(|| TokenError::Invalid("unknown principal".to_string()))?;

        if self.directory.is_locked_out(&principal.id).await? {
            return Err(AuthError::AccountLocked.into());
        }

        if !principal.has_valid_refresh_token(refresh_token, Utc::now()) {
            return Err(TokenError::Invalid("refresh token mismatch or expired".to_string()).into());
        }

        if self
            .user_tokens_invalidated(&principal.id, &claims)
            .await
            && !self.is_exception_token(&principal.id, access_token).await
        {
            return Err(TokenError::Invalid("token antedates invalidation".to_string()).into());
        }

        // Rotation kills the old access token for whatever lifetime it has
        // left. Write failures are not swallowed here; an unrecorded
        // revocation must be visible to the caller.
        let remaining = self.codec.remaining_validity(access_token)?;
        if remaining > Duration::zero() {
            self.revocation
                .blacklist_token(access_token, claims.expires_at())
                .await?;
        }

        self.issue_tokens(principal).await
    }

    /// End a session, revoking its access token and clearing the stored
    /// credential pair
    ///
    /// Never fails the caller-visible flow; every step is best-effort and
    /// failures are only logged.
    pub async fn logout(&self, user_id: &PrincipalId, access_token: &str) -> Result<(), Error> {
        match self.codec.decode_expired(access_token) {
            Ok(claims) => {
                let remaining = claims.expires_at() - Utc::now();
                if remaining > Duration::zero() {
                    if let Err(err) = self
                        .revocation
                        .blacklist_token(access_token, claims.expires_at())
                        .await
                    {
                        tracing::warn!(%err, user_id = %user_id, "failed to blacklist token on logout");
                    }
                }
            }
            Err(err) => {
                tracing::debug!(%err, user_id = %user_id, "logout presented an unparseable token");
            }
        }

        match self.directory.find_by_id(user_id).await {
            Ok(Some(mut principal)) => {
                principal.clear_refresh_token();
                if let Err(err) = self.directory.update(&principal).await {
                    tracing::warn!(%err, user_id = %user_id, "failed to clear credential pair on logout");
                }
            }
            Ok(None) => {
                tracing::debug!(user_id = %user_id, "logout for unknown principal");
            }
            Err(err) => {
                tracing::warn!(%err, user_id = %user_id, "directory lookup failed on logout");
            }
        }

        Ok(())
    }

    /// Change the password, then revoke sessions per the requested behavior
    pub async fn change_password(
        &self,
        user_id: &PrincipalId,
        current_password: &str,
        new_password: &str,
        behavior: PasswordChangeBehavior,
        current_access_token: Option<&str>,
    ) -> Result<(), Error> {
        let principal = self
            .directory
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !self
            .directory
            .check_password(&principal.id, current_password)
            .await?
        {
            return Err(AuthError::IncorrectCurrentPassword.into());
        }

        if new_password == current_password {
            return Err(AuthError::NewPasswordSameAsOld.into());
        }

        self.directory
            .set_password(&principal.id, new_password)
            .await
            .map_err(|e| ValidationError::UpdateRejected(e.to_string()))?;

        match behavior {
            PasswordChangeBehavior::KeepAllSessions => {}
            PasswordChangeBehavior::LogoutOthersOnly => {
                // An absent current token degrades to a full logout inside
                // the store.
                self.revocation
                    .blacklist_all_for_user_except(
                        &principal.id,
                        current_access_token.unwrap_or_default(),
                    )
                    .await?;
            }
            PasswordChangeBehavior::LogoutAllIncludingCurrent => {
                self.revocation.blacklist_all_for_user(&principal.id).await?;
            }
        }

        Ok(())
    }

    /// Start enabling or disabling the second factor
    ///
    /// Requires the current password and sends a confirmation passcode.
    pub async fn request_two_factor_change(
        &self,
        user_id: &PrincipalId,
        password: &str,
        enable: bool,
    ) -> Result<(), Error> {
        let principal = self
            .directory
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        self.ensure_two_factor_transition(&principal, enable)?;

        if !self
            .directory
            .check_password(&principal.id, password)
            .await?
        {
            return Err(AuthError::InvalidCredentials.into());
        }

        self.otp.check_throttle(&principal).await?;
        let challenge = self.otp.issue(&principal).await?;
        self.send_code_email(&principal, &challenge.code).await;

        Ok(())
    }

    /// Confirm a second-factor change with the emailed passcode
    pub async fn confirm_two_factor_change(
        &self,
        user_id: &PrincipalId,
        code: &str,
        enable: bool,
    ) -> Result<(), Error> {
        let mut principal = self
            .directory
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        self.ensure_two_factor_transition(&principal, enable)?;

        if !self.otp.verify(&principal, code).await? {
            return Err(OtpError::InvalidOrExpired.into());
        }

        principal.two_factor_enabled = enable;
        self.directory
            .update(&principal)
            .await
            .map_err(|e| ValidationError::UpdateRejected(e.to_string()))?;

        if !enable {
            // Disabling supersedes any login challenge still pending.
            self.otp.force_clear(&principal).await?;
        }

        Ok(())
    }

    /// Void every token the user holds, unconditionally
    ///
    /// The revocation write is the point of this call and always happens;
    /// clearing the stored credential pair is best-effort on top.
    pub async fn invalidate_all_user_tokens(&self, user_id: &PrincipalId) -> Result<(), Error> {
        self.revocation.blacklist_all_for_user(user_id).await?;

        match self.directory.find_by_id(user_id).await {
            Ok(Some(mut principal)) => {
                principal.clear_refresh_token();
                if let Err(err) = self.directory.update(&principal).await {
                    tracing::warn!(%err, user_id = %user_id, "failed to clear credential pair during invalidation");
                }
            }
            Ok(None) => {
                tracing::warn!(user_id = %user_id, "invalidation for unknown principal");
            }
            Err(err) => {
                tracing::warn!(%err, user_id = %user_id, "directory lookup failed during invalidation");
            }
        }

        Ok(())
    }

    /// Re-validate a presented access token
    ///
    /// Full validation: signature, algorithm, expiry, blacklist entry, and
    /// the user's invalidation watermark (with the exception-token carve-out).
    pub async fn validate_access_token(&self, access_token: &str) -> Result<AccessClaims, Error> {
        let claims = self.codec.decode(access_token)?;

        if self.token_blacklisted(access_token).await {
            return Err(TokenError::Invalid("token revoked".to_string()).into());
        }

        let user_id = PrincipalId::new(&claims.sub);
        if self.user_tokens_invalidated(&user_id, &claims).await
            && !self.is_exception_token(&user_id, access_token).await
        {
            return Err(TokenError::Invalid("token antedates invalidation".to_string()).into());
        }

        Ok(claims)
    }

    fn ensure_two_factor_transition(
        &self,
        principal: &Principal,
        enable: bool,
    ) -> Result<(), Error> {
        if principal.two_factor_enabled == enable {
            return Err(if enable {
                AuthError::TwoFactorAlreadyEnabled.into()
            } else {
                AuthError::TwoFactorAlreadyDisabled.into()
            });
        }
        Ok(())
    }

    /// Issue a fresh access token and rotate the credential pair
    async fn issue_tokens(&self, mut principal: Principal) -> Result<AuthTokens, Error> {
        let roles = self.directory.roles(&principal.id).await?;
        let (access_token, _expires_at) = self.codec.issue(&principal, &roles)?;

        let refresh_token = generate_opaque_token();
        principal.set_refresh_token(refresh_token.clone(), Utc::now() + self.refresh_token_ttl);
        let principal = self.directory.update(&principal).await?;

        Ok(AuthTokens::issued(
            access_token,
            refresh_token,
            principal.email,
        ))
    }

    /// Fire-and-forget delivery of a passcode
    async fn send_code_email(&self, principal: &Principal, code: &str) {
        let message = EmailMessage::one_time_code(principal.email.clone(), code);
        if let Err(err) = self.mailer.send(message).await {
            tracing::warn!(%err, principal_id = %principal.id, "failed to send passcode email");
        }
    }

    /// Fail-open blacklist read
    async fn token_blacklisted(&self, token: &str) -> bool {
        match self.revocation.is_blacklisted(token).await {
            Ok(blacklisted) => blacklisted,
            Err(err) => {
                tracing::warn!(%err, "blacklist read failed, treating token as not blacklisted");
                false
            }
        }
    }

    /// Fail-open watermark read
    async fn user_tokens_invalidated(&self, user_id: &PrincipalId, claims: &AccessClaims) -> bool {
        match self
            .revocation
            .are_user_tokens_invalidated(user_id, claims.issued_at())
            .await
        {
            Ok(invalidated) => invalidated,
            Err(err) => {
                tracing::warn!(%err, user_id = %user_id, "watermark read failed, treating user tokens as not invalidated");
                false
            }
        }
    }

    /// Fail-open exception-token read with exact string comparison
    async fn is_exception_token(&self, user_id: &PrincipalId, token: &str) -> bool {
        match self.revocation.exception_token(user_id).await {
            Ok(exception) => exception.as_deref() == Some(token),
            Err(err) => {
                tracing::warn!(%err, user_id = %user_id, "exception token read failed");
                false
            }
        }
    }
}
