//! Outbound email seam
//!
//! The orchestrator treats email as best-effort notify: a failed send is
//! logged, never surfaced to the caller, and never rolls back state that
//! was already written.

use async_trait::async_trait;

use crate::Error;

/// A rendered message ready for delivery
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    /// The message carrying a one-time passcode
    ///
    /// The body deliberately contains no digits other than the code itself.
    pub fn one_time_code(to: impl Into<String>, code: &str) -> Self {
        Self {
            to: to.into(),
            subject: "Your verification code".to_string(),
            body: format!("Your verification code is {code}. It expires shortly."),
        }
    }
}

/// Delivers rendered messages to an address
#[async_trait]
pub trait MailSender: Send + Sync + 'static {
    async fn send(&self, message: EmailMessage) -> Result<(), Error>;
}
