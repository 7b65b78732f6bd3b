//! Password acceptability and username rules, checked before anything is hashed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Characters that satisfy the symbol rule (ASCII punctuation).
pub const SYMBOLS: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Longest accepted username, in characters.
pub const MAX_USERNAME_CHARS: usize = 64;

/// A single password requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordRule {
    MinLength(usize),
    Uppercase,
    Lowercase,
    Digit,
    Symbol,
}

impl fmt::Display for PasswordRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordRule::MinLength(n) => write!(f, "must be at least {} characters long", n),
            PasswordRule::Uppercase => f.write_str("must contain an uppercase letter"),
            PasswordRule::Lowercase => f.write_str("must contain a lowercase letter"),
            PasswordRule::Digit => f.write_str("must contain a digit"),
            PasswordRule::Symbol => write!(f, "must contain a symbol from {}", SYMBOLS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordPolicy {
    /// Minimum length in characters (not bytes).
    pub min_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self { min_length: 12 }
    }
}

impl PasswordPolicy {
    /// Check a candidate password, reporting every rule it breaks.
    pub fn check(&self, password: &str) -> Result<(), AuthError> {
        let violations = self.violations(password);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(AuthError::WeakPassword(violations))
        }
    }

    pub fn violations(&self, password: &str) -> Vec<PasswordRule> {
        let mut failed = Vec::new();
        if password.chars().count() < self.min_length {
            failed.push(PasswordRule::MinLength(self.min_length));
        }
        if !password.chars().any(|c| c.is_uppercase()) {
            failed.push(PasswordRule::Uppercase);
        }
        if !password.chars().any(|c| c.is_lowercase()) {
            failed.push(PasswordRule::Lowercase);
        }
        if !password.chars().any(|c| c.is_ascii_digit()) {
            failed.push(PasswordRule::Digit);
        }
        if !password.chars().any(|c| SYMBOLS.contains(c)) {
            failed.push(PasswordRule::Symbol);
        }
        failed
    }
}

/// Usernames are identifiers: non-empty, bounded, no control characters or
/// surrounding whitespace.
pub fn validate_username(username: &str) -> Result<(), AuthError> {
    if username.is_empty() {
        return Err(AuthError::InvalidUsername("must not be empty".into()));
    }
    if username.chars().count() > MAX_USERNAME_CHARS {
        return Err(AuthError::InvalidUsername(format!(
            "must be at most {} characters",
            MAX_USERNAME_CHARS
        )));
    }
    if username.chars().any(char::is_control) {
        return Err(AuthError::InvalidUsername(
            "must not contain control characters".into(),
        ));
    }
    if username.trim() != username {
        return Err(AuthError::InvalidUsername(
            "must not start or end with whitespace".into(),
        ));
    }
    Ok(())
}
