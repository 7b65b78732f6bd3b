//! Security core configuration.
//!
//! Tunables deserialize from whatever source the host application uses;
//! secrets are held separately in [`SecurityKeys`] and never pass through serde.

use std::time::Duration;

use pixvault_crypto::EncryptionKey;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::policy::PasswordPolicy;
use crate::token::TokenSecret;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub token: TokenConfig,
    pub rate_limit: RateLimitConfig,
    pub password: PasswordPolicy,
    pub hashing: HashingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Bearer token lifetime in seconds.
    pub ttl_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self { ttl_secs: 30 * 60 }
    }
}

impl TokenConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Failed attempts allowed inside one window.
    pub max_attempts: usize,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_secs: 60,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashingConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashingConfig {
    /// OWASP baseline for Argon2id: 19 MiB, 2 passes, 1 lane.
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Process-lifetime secrets, constructed once and handed to the components.
#[derive(Debug, Clone)]
pub struct SecurityKeys {
    pub encryption: EncryptionKey,
    pub signing: TokenSecret,
}

impl SecurityKeys {
    /// Split a single master secret into independent encryption and signing keys.
    pub fn from_master_secret(master: &[u8]) -> Result<Self, AuthError> {
        Ok(Self {
            encryption: EncryptionKey::derive(master)?,
            signing: TokenSecret::derive(master)?,
        })
    }
}
