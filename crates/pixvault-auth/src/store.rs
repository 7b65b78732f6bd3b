//! Credential lookup seam between the login flow and persistence.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::credentials::Credential;
use crate::error::AuthError;

/// Account persistence used by the login flow.
///
/// `insert` must be atomic on the username: a second insert for the same
/// name fails with [`AuthError::UsernameTaken`].
pub trait CredentialStore: Send + Sync {
    fn find(&self, username: &str) -> Result<Option<Credential>, AuthError>;

    fn insert(&self, credential: Credential) -> Result<(), AuthError>;
}

/// HashMap-backed store for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    accounts: RwLock<HashMap<String, Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn find(&self, username: &str) -> Result<Option<Credential>, AuthError> {
        Ok(self.accounts.read().get(username).cloned())
    }

    fn insert(&self, credential: Credential) -> Result<(), AuthError> {
        let mut accounts = self.accounts.write();
        if accounts.contains_key(&credential.username) {
            return Err(AuthError::UsernameTaken);
        }
        accounts.insert(credential.username.clone(), credential);
        Ok(())
    }
}
