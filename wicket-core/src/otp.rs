//! One-time passcode engine
//!
//! Generates, verifies, and throttles six-digit codes used as a login
//! second factor and to confirm security-sensitive changes. Challenge
//! state is deliberately not a dedicated record: it lives as two small
//! attributes on the principal in the external user directory, which
//! naturally scopes things to one outstanding challenge per user. The
//! trade-off is no concurrent multi-device challenges, which is acceptable
//! for a login gate.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::{AuthConfig, Error, Principal, UserDirectory, error::OtpError};

/// Attribute key holding the last issued passcode
pub const OTP_CODE_ATTR: &str = "otp_code";
/// Attribute key holding the unix timestamp of the last issuance
pub const OTP_SENT_AT_ATTR: &str = "otp_sent_at";

/// An issued challenge, returned to the caller for delivery
#[derive(Debug, Clone)]
pub struct OtpChallenge {
    /// Six-digit code, leading zeros preserved
    pub code: String,
    /// Instant after which the code no longer verifies
    pub expires_at: DateTime<Utc>,
}

/// Generates and verifies one-time passcodes against directory-held state
pub struct OtpEngine<D: UserDirectory> {
    directory: Arc<D>,
    lifespan: Duration,
    throttle: Duration,
}

impl<D: UserDirectory> OtpEngine<D> {
    pub fn new(directory: Arc<D>, config: &AuthConfig) -> Self {
        Self {
            directory,
            lifespan: config.otp_lifespan,
            throttle: config.otp_throttle,
        }
    }

    /// Issue a fresh challenge, superseding any pending one
    ///
    /// Does not throttle; callers gate resends through
    /// [`check_throttle`](Self::check_throttle) first.
    pub async fn issue(&self, principal: &Principal) -> Result<OtpChallenge, Error> {
        let now = Utc::now();
        let code = format!("{:06}", rand::rng().random_range(0..1_000_000u32));

        self.directory
            .set_attribute(&principal.id, OTP_SENT_AT_ATTR, &now.timestamp().to_string())
            .await?;
        self.directory
            .set_attribute(&principal.id, OTP_CODE_ATTR, &code)
            .await?;

        Ok(OtpChallenge {
            code,
            expires_at: now + self.lifespan,
        })
    }

    /// Refuse issuance while the previous send is inside the throttle window
    pub async fn check_throttle(&self, principal: &Principal) -> Result<(), Error> {
        let Some(raw) = self
            .directory
            .get_attribute(&principal.id, OTP_SENT_AT_ATTR)
            .await?
        else {
            return Ok(());
        };

        let Some(sent_at) = parse_sent_at(&principal.id, &raw) else {
            return Ok(());
        };

        if Utc::now() - sent_at < self.throttle {
            return Err(OtpError::Throttled.into());
        }

        Ok(())
    }

    /// Verify a submitted code against the pending challenge
    ///
    /// Success consumes the challenge. Mismatch or expiry returns false
    /// WITHOUT clearing state, so throttling still covers the exhausted
    /// attempt.
    pub async fn verify(&self, principal: &Principal, submitted: &str) -> Result<bool, Error> {
        let Some(code) = self
            .directory
            .get_attribute(&principal.id, OTP_CODE_ATTR)
            .await?
        else {
            return Ok(false);
        };

        if code != submitted {
            return Ok(false);
        }

        let Some(raw) = self
            .directory
            .get_attribute(&principal.id, OTP_SENT_AT_ATTR)
            .await?
        else {
            return Ok(false);
        };
        let Some(sent_at) = parse_sent_at(&principal.id, &raw) else {
            return Ok(false);
        };

        if Utc::now() - sent_at > self.lifespan {
            return Ok(false);
        }

        self.force_clear(principal).await?;
        Ok(true)
    }

    /// Unconditionally drop any pending challenge
    ///
    /// Used when a flow is abandoned or superseded, e.g. the user disables
    /// their second factor mid-challenge.
    pub async fn force_clear(&self, principal: &Principal) -> Result<(), Error> {
        self.directory
            .remove_attribute(&principal.id, OTP_CODE_ATTR)
            .await?;
        self.directory
            .remove_attribute(&principal.id, OTP_SENT_AT_ATTR)
            .await?;
        Ok(())
    }
}

fn parse_sent_at(id: &crate::PrincipalId, raw: &str) -> Option<DateTime<Utc>> {
    match raw.parse::<i64>().ok().and_then(|ts| DateTime::from_timestamp(ts, 0)) {
        Some(sent_at) => Some(sent_at),
        None => {
            tracing::warn!(
                principal_id = %id,
                value = %raw,
                "malformed passcode timestamp attribute, ignoring it"
            );
            None
        }
    }
}
