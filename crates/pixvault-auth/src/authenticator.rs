//! Registration and login flows over the credential, token and throttle components.
//!
//! Password login: throttle check → credential verify → on failure record it
//! and answer 401 (or 429 once the limit is hit) → on success issue a token.
//! Provider login trusts the external identity and goes straight to issuance.

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::clock::Clock;
use crate::config::SecurityConfig;
use crate::credentials::{Credential, CredentialManager, PasswordHash};
use crate::error::AuthError;
use crate::policy::{validate_username, PasswordPolicy};
use crate::rate_limit::{LoginRateLimiter, LoginThrottle, ThrottleKey};
use crate::store::CredentialStore;
use crate::token::{BearerToken, TokenIssuer, TokenSecret};

/// A password login attempt.
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    /// Client address, when the transport knows it.
    pub origin: Option<IpAddr>,
}

impl LoginRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            origin: None,
        }
    }

    pub fn from_origin(mut self, origin: IpAddr) -> Self {
        self.origin = Some(origin);
        self
    }

    fn throttle_keys(&self) -> Vec<ThrottleKey> {
        let mut keys = vec![ThrottleKey::Username(self.username.clone())];
        if let Some(addr) = self.origin {
            keys.push(ThrottleKey::Origin(addr));
        }
        keys
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("origin", &self.origin)
            .finish()
    }
}

/// Identity asserted by the external provider after its own verification.
#[derive(Debug, Clone)]
pub struct ProviderIdentity {
    pub username: String,
}

pub struct Authenticator<S, T = LoginRateLimiter> {
    store: S,
    throttle: T,
    credentials: CredentialManager,
    tokens: TokenIssuer,
    policy: PasswordPolicy,
    /// Verified against when the account is unknown or has no password, so
    /// the response time does not reveal which case occurred.
    decoy_hash: PasswordHash,
}

impl<S: CredentialStore> Authenticator<S> {
    /// Build with the in-memory rate limiter.
    pub fn new(
        config: &SecurityConfig,
        signing: TokenSecret,
        store: S,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthError> {
        let throttle = LoginRateLimiter::new(&config.rate_limit, clock.clone());
        Self::with_throttle(config, signing, store, throttle, clock)
    }
}

impl<S: CredentialStore, T: LoginThrottle> Authenticator<S, T> {
    pub fn with_throttle(
        config: &SecurityConfig,
        signing: TokenSecret,
        store: S,
        throttle: T,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthError> {
        let credentials = CredentialManager::new(&config.hashing)?;

        let mut decoy = [0u8; 32];
        getrandom::getrandom(&mut decoy).map_err(|e| AuthError::Hashing(e.to_string()))?;
        let decoy_hash = credentials.hash(&pixvault_crypto::base64url_encode(&decoy))?;

        Ok(Self {
            store,
            throttle,
            credentials,
            tokens: TokenIssuer::new(signing, config.token.ttl(), clock),
            policy: config.password.clone(),
            decoy_hash,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn throttle(&self) -> &T {
        &self.throttle
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Create a password account.
    pub async fn register(&self, username: &str, password: &str) -> Result<Credential, AuthError> {
        validate_username(username)?;
        self.policy.check(password)?;
        if self.store.find(username)?.is_some() {
            return Err(AuthError::UsernameTaken);
        }

        let credentials = self.credentials.clone();
        let password = Zeroizing::new(password.to_string());
        let hash = tokio::task::spawn_blocking(move || credentials.hash(&password))
            .await
            .map_err(|e| AuthError::Worker(e.to_string()))??;

        let credential = Credential::with_password(username, hash);
        self.store.insert(credential.clone())?;
        info!(username, "registered account");
        Ok(credential)
    }

    /// Verify a password login and issue a bearer token.
    pub async fn login(&self, request: LoginRequest) -> Result<BearerToken, AuthError> {
        // A name that could never have registered is not used as a throttle key.
        if validate_username(&request.username).is_err() {
            debug!(origin = ?request.origin, "rejected login with invalid username");
            if let Some(addr) = request.origin {
                let key = ThrottleKey::Origin(addr);
                self.throttle.check(&key)?;
                self.throttle.register_failure(&key)?;
            }
            return Err(AuthError::InvalidCredentials);
        }

        let keys = request.throttle_keys();
        for key in &keys {
            self.throttle.check(key)?;
        }

        let stored = self
            .store
            .find(&request.username)?
            .and_then(|credential| credential.password_hash);
        let (hash, can_match) = match stored {
            Some(hash) => (hash, true),
            None => (self.decoy_hash.clone(), false),
        };

        let credentials = self.credentials.clone();
        let password = Zeroizing::new(request.password);
        let verified = tokio::task::spawn_blocking(move || credentials.verify(&password, Some(&hash)))
            .await
            .map_err(|e| AuthError::Worker(e.to_string()))?;

        if !(verified && can_match) {
            debug!(username = %request.username, "password login failed");
            let mut limited = None;
            for key in &keys {
                if let Err(e) = self.throttle.register_failure(key) {
                    limited.get_or_insert(e);
                }
            }
            return Err(limited.unwrap_or(AuthError::InvalidCredentials));
        }

        self.tokens
            .issue(&request.username, self.tokens.default_ttl())
    }

    /// Issue a token for an identity the external provider has already verified,
    /// creating a password-less account on first sight.
    pub fn login_with_provider(&self, identity: &ProviderIdentity) -> Result<BearerToken, AuthError> {
        validate_username(&identity.username)?;
        if self.store.find(&identity.username)?.is_none() {
            match self
                .store
                .insert(Credential::from_provider(identity.username.as_str()))
            {
                Ok(()) => info!(username = %identity.username, "created provider account"),
                // Lost a race with a concurrent first login; the account exists now.
                Err(AuthError::UsernameTaken) => {}
                Err(e) => return Err(e),
            }
        }
        self.tokens
            .issue(&identity.username, self.tokens.default_ttl())
    }

    /// Resolve a bearer token to its subject.
    pub fn authenticate(&self, token: &str) -> Result<String, AuthError> {
        self.tokens.validate(token)
    }
}
