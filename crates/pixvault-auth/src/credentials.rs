//! One-way password storage with Argon2id.
//!
//! Hashes are PHC strings (`$argon2id$v=19$m=..,t=..,p=..$salt$hash`) so the
//! salt and cost travel with the digest and old hashes keep verifying after
//! the configured cost changes.

use std::fmt;

use argon2::password_hash::{
    PasswordHash as PhcHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::config::HashingConfig;
use crate::error::AuthError;

/// Salt length in bytes.
const SALT_LENGTH: usize = 16;

/// Stored password digest. There is no operation that recovers the password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Wrap a PHC string loaded from storage.
    pub fn from_stored(phc: impl Into<String>) -> Self {
        Self(phc.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}

/// A registered account.
///
/// `password_hash` is `None` for accounts created through the external
/// identity provider; those can never log in with a password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password_hash: Option<PasswordHash>,
    pub created_at: DateTime<Utc>,
}

impl Credential {
    pub fn with_password(username: impl Into<String>, hash: PasswordHash) -> Self {
        Self {
            username: username.into(),
            password_hash: Some(hash),
            created_at: Utc::now(),
        }
    }

    pub fn from_provider(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password_hash: None,
            created_at: Utc::now(),
        }
    }
}

/// Hashes and verifies passwords. Holds only immutable cost parameters, so
/// clones are cheap and can be moved onto blocking worker threads.
#[derive(Clone)]
pub struct CredentialManager {
    argon2: Argon2<'static>,
}

impl CredentialManager {
    pub fn new(config: &HashingConfig) -> Result<Self, AuthError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| AuthError::Hashing(format!("invalid Argon2 parameters: {}", e)))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a password with a fresh random salt. Two calls never return the same hash.
    pub fn hash(&self, password: &str) -> Result<PasswordHash, AuthError> {
        let mut salt_bytes = [0u8; SALT_LENGTH];
        getrandom::getrandom(&mut salt_bytes).map_err(|e| AuthError::Hashing(e.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes);
        salt_bytes.zeroize();
        let salt = salt.map_err(|e| AuthError::Hashing(e.to_string()))?;

        let phc = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        Ok(PasswordHash(phc.to_string()))
    }

    /// Check a password against a stored hash.
    ///
    /// An absent hash (provider account) or an unparsable one is never a match.
    /// The digest comparison inside Argon2 is constant-time.
    pub fn verify(&self, password: &str, hash: Option<&PasswordHash>) -> bool {
        let Some(hash) = hash else {
            return false;
        };
        let parsed = match PhcHash::new(&hash.0) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "stored password hash could not be parsed");
                return false;
            }
        };
        self.argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

impl fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialManager").finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) fn fast_hashing() -> HashingConfig {
    HashingConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}
