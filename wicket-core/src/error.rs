use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("One-time passcode error: {0}")]
    Otp(#[from] OtpError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("Email address not confirmed")]
    UserNotConfirmed,

    #[error("Account is locked out")]
    AccountLocked,

    #[error("Current password is incorrect")]
    IncorrectCurrentPassword,

    #[error("New password must differ from the current password")]
    NewPasswordSameAsOld,

    #[error("Two-factor authentication is already enabled")]
    TwoFactorAlreadyEnabled,

    #[error("Two-factor authentication is already disabled")]
    TwoFactorAlreadyDisabled,

    #[error("Two-factor authentication is not enabled")]
    TwoFactorNotEnabled,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Token expired")]
    Expired,
}

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("Passcode is invalid or has expired")]
    InvalidOrExpired,

    #[error("Passcode was requested too recently")]
    Throttled,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Record not found")]
    NotFound,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Signing secret too short: {actual} bytes, need at least {required}")]
    SecretTooShort { actual: usize, required: usize },

    #[error("Update rejected: {0}")]
    UpdateRejected(String),
}

impl Error {
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Auth(_))
    }

    pub fn is_token_error(&self) -> bool {
        matches!(self, Error::Token(_))
    }

    pub fn is_otp_error(&self) -> bool {
        matches!(self, Error::Otp(_))
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}
