use std::time::Duration;

use thiserror::Error;

use crate::policy::PasswordRule;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Password rejected: {}", describe_rules(.0))]
    WeakPassword(Vec<PasswordRule>),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Username already registered")]
    UsernameTaken,

    /// Same message whether the user is unknown or the password is wrong.
    #[error("Incorrect username or password")]
    InvalidCredentials,

    #[error("Too many login attempts, retry in {}s", .retry_after.as_secs().max(1))]
    RateLimited { retry_after: Duration },

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Invalid signing secret: {0}")]
    InvalidSecret(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("Credential store error: {0}")]
    Store(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Crypto error: {0}")]
    Crypto(#[from] pixvault_crypto::CryptoError),
}

impl AuthError {
    /// HTTP status the endpoint layer reports for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::WeakPassword(_) | AuthError::InvalidUsername(_) | AuthError::UsernameTaken => {
                400
            }
            AuthError::InvalidCredentials
            | AuthError::ExpiredToken
            | AuthError::InvalidSignature
            | AuthError::MalformedToken(_) => 401,
            AuthError::RateLimited { .. } => 429,
            _ => 500,
        }
    }

    /// Token failures: the caller must re-authenticate, never retry.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            AuthError::ExpiredToken | AuthError::InvalidSignature | AuthError::MalformedToken(_)
        )
    }
}

fn describe_rules(rules: &[PasswordRule]) -> String {
    rules
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
