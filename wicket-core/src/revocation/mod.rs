//! Distributed token revocation
//!
//! The revocation store is the single point of cross-request coordination
//! in the subsystem. It records two kinds of facts in a TTL-capable
//! key-value store:
//!
//! - **Blacklist entries** (`blacklist:<token>`): a specific token must die
//!   before its natural expiry. Entries self-expire; nothing deletes them.
//! - **Per-user invalidation watermarks** (`user_tokens_invalidated_<id>`):
//!   every token issued before the stored instant is void, optionally
//!   paired with one **exception token** (`user_tokens_exception_<id>`)
//!   that stays trusted. This is what makes "log out my other sessions"
//!   work without a per-device token registry.
//!
//! Failure semantics are deliberately asymmetric and must stay that way:
//! the orchestrator treats *read* failures as "not revoked" (availability
//! over strict revocation during store outages) while *write* failures
//! propagate so callers can tell a revocation did not persist. An explicit
//! blacklist entry, once readable, always fails closed.

pub mod memory;

pub use memory::MemoryRevocationStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{Error, PrincipalId};

/// Key for a single-token blacklist entry
pub fn blacklist_key(token: &str) -> String {
    format!("blacklist:{token}")
}

/// Key for a per-user invalidation watermark
pub fn watermark_key(user_id: &PrincipalId) -> String {
    format!("user_tokens_invalidated_{user_id}")
}

/// Key for a per-user exception token
pub fn exception_key(user_id: &PrincipalId) -> String {
    format!("user_tokens_exception_{user_id}")
}

/// Store recording blacklisted tokens and per-user invalidation watermarks
///
/// All operations are idempotent and safe under concurrent callers.
/// Production deployments back this with a shared, network-addressable TTL
/// store so every orchestrator instance observes the same state.
#[async_trait]
pub trait RevocationStore: Send + Sync + 'static {
    /// Record a token as revoked until its natural expiry
    ///
    /// The entry TTL is `expires_at - now`; if that duration is
    /// non-positive the call is a no-op, since an expired token needs no
    /// tracking.
    async fn blacklist_token(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), Error>;

    /// Whether a token has an active blacklist entry
    async fn is_blacklisted(&self, token: &str) -> Result<bool, Error>;

    /// Void every token the user holds by writing watermark = now
    ///
    /// Clears any exception token for the user; a full logout supersedes a
    /// partial one.
    async fn blacklist_all_for_user(&self, user_id: &PrincipalId) -> Result<(), Error>;

    /// Void every token the user holds except `keep_token`
    ///
    /// Writes watermark = now and records `keep_token` as the exception.
    /// An empty `keep_token` degrades to [`blacklist_all_for_user`].
    ///
    /// [`blacklist_all_for_user`]: RevocationStore::blacklist_all_for_user
    async fn blacklist_all_for_user_except(
        &self,
        user_id: &PrincipalId,
        keep_token: &str,
    ) -> Result<(), Error>;

    /// Whether a token issued at `issued_at` antedates the user's watermark
    ///
    /// Absent watermark means nothing was ever invalidated. Malformed
    /// watermark data is logged and treated as "not invalidated", never
    /// surfaced as an error.
    async fn are_user_tokens_invalidated(
        &self,
        user_id: &PrincipalId,
        issued_at: DateTime<Utc>,
    ) -> Result<bool, Error>;

    /// The exception token recorded for the user, if any
    ///
    /// Equality against a presented token is an exact string match,
    /// checked by the orchestrator.
    async fn exception_token(&self, user_id: &PrincipalId) -> Result<Option<String>, Error>;
}
