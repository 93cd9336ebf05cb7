//! Signed access token codec
//!
//! The only component in the crate touching cryptographic primitives.
//! Tokens are HS256 JWTs carrying the principal's identity and roles;
//! validity is signature + expiry + the revocation checks performed by the
//! session orchestrator.
//!
//! [`TokenCodec::decode_expired`] is a deliberate, narrow exception to
//! "always check expiry": it exists solely so a refresh request can present
//! an access token whose signature is intact but whose lifetime has passed.
//! It still rejects any algorithm other than the configured one, including
//! other members of the HMAC family and stripped/none headers.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{AuthConfig, Error, Principal, error::TokenError, id::generate_prefixed_id};

/// Claims carried by a signed access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject - principal ID
    pub sub: String,
    /// Display/login name of the principal
    pub name: String,
    /// Email address of the principal
    pub email: String,
    /// Role names assigned at issuance time
    #[serde(default)]
    pub roles: Vec<String>,
    /// Unique token identifier
    ///
    /// Timestamps have second resolution, so without this two tokens
    /// issued back to back for the same principal would serialize to the
    /// same string, and revoking one would revoke both.
    pub jti: String,
    /// Issued at in seconds (as UTC timestamp)
    pub iat: i64,
    /// Expiration time in seconds (as UTC timestamp)
    pub exp: i64,
    /// Issuer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl AccessClaims {
    /// The issued-at instant, as recorded in the token
    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or_else(Utc::now)
    }

    /// The expiry instant, as recorded in the token
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

/// Builds and parses signed bearer tokens
///
/// Keys are derived once from the validated [`AuthConfig`]; construction
/// cannot fail because the config constructor already rejected unusable
/// secrets.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: Option<String>,
    access_token_ttl: Duration,
}

impl TokenCodec {
    /// Create a codec from a validated configuration
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret()),
            decoding_key: DecodingKey::from_secret(config.secret()),
            issuer: config.issuer.clone(),
            access_token_ttl: config.access_token_ttl,
        }
    }

    /// Build and sign an access token for a principal
    ///
    /// Returns the opaque token string plus its computed expiry instant.
    pub fn issue(
        &self,
        principal: &Principal,
        roles: &[String],
    ) -> Result<(String, DateTime<Utc>), Error> {
        let now = Utc::now();
        let expires_at = now + self.access_token_ttl;

        let claims = AccessClaims {
            sub: principal.id.to_string(),
            name: principal.name.clone(),
            email: principal.email.clone(),
            roles: roles.to_vec(),
            jti: generate_prefixed_id("tok"),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Invalid(format!("Failed to encode token: {e}")))?;

        Ok((token, expires_at))
    }

    /// Verify signature, algorithm, and structure with expiry enforced
    pub fn decode(&self, token: &str) -> Result<AccessClaims, Error> {
        self.decode_with_validation(token, self.validation(true))
    }

    /// Verify signature, algorithm, and structure while ignoring expiry
    ///
    /// This path exists solely to support refresh; callers must still treat
    /// the token as expired for every other purpose.
    pub fn decode_expired(&self, token: &str) -> Result<AccessClaims, Error> {
        self.decode_with_validation(token, self.validation(false))
    }

    /// Remaining lifetime of a token, zero if it has already expired
    ///
    /// Used to size blacklist TTLs; expired tokens need no tracking.
    pub fn remaining_validity(&self, token: &str) -> Result<Duration, Error> {
        let claims = self.decode_expired(token)?;
        let remaining = claims.expires_at() - Utc::now();
        Ok(remaining.max(Duration::zero()))
    }

    fn validation(&self, validate_exp: bool) -> Validation {
        // Restricting the algorithm list is what rejects confusion attacks:
        // a token signed HS384/HS512 or carrying a stripped header fails
        // here even when the secret would otherwise verify.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = validate_exp;
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        validation
    }

    fn decode_with_validation(
        &self,
        token: &str,
        validation: Validation,
    ) -> Result<AccessClaims, Error> {
        let data = decode::<AccessClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(format!("Token validation failed: {e}")),
            }
        })?;

        Ok(data.claims)
    }
}
