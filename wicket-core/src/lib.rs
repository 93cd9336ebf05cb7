//! Core functionality for the wicket session and token lifecycle subsystem
//!
//! This crate contains the four cooperating components of the subsystem:
//!
//! - [`TokenCodec`]: builds and parses signed bearer tokens
//! - [`RevocationStore`]: a TTL key-value abstraction recording
//!   blacklisted tokens and per-user invalidation watermarks
//! - [`otp::OtpEngine`]: generates, verifies, and throttles six-digit
//!   passcodes
//! - [`services::SessionService`]: the orchestrator coordinating login,
//!   refresh, logout, password-change, and second-factor flows
//!
//! plus the collaborator seams it consumes: [`UserDirectory`] for the
//! externally owned principal record and [`mailer::MailSender`] for
//! outbound email.
//!
//! The crate is designed to be used through the `wicket` facade and is not
//! intended to be wired up directly by application code.

pub mod config;
pub mod error;
pub mod id;
pub mod mailer;
pub mod otp;
pub mod principal;
pub mod revocation;
pub mod services;
pub mod token;

pub use config::AuthConfig;
pub use error::Error;
pub use principal::{Principal, PrincipalId, UserDirectory};
pub use revocation::{MemoryRevocationStore, RevocationStore};
pub use token::{AccessClaims, TokenCodec};
