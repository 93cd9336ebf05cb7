//! Service layer for business logic
//!
//! This module contains the orchestration logic coordinating the token
//! codec, revocation store, OTP engine, and external collaborators.

pub mod session;

pub use session::{AuthTokens, PasswordChangeBehavior, SessionService};
