//! Wiring for the whole security core from one config and one set of keys.

use std::path::PathBuf;
use std::sync::Arc;

use pixvault_crypto::{EncryptedFileStore, FieldCodec};

use crate::authenticator::Authenticator;
use crate::clock::{Clock, SystemClock};
use crate::config::{SecurityConfig, SecurityKeys};
use crate::error::AuthError;
use crate::store::CredentialStore;

/// The field codec and the authenticator, built together so both secrets are
/// injected once at startup instead of living in globals.
pub struct SecurityCore<S> {
    codec: Arc<FieldCodec>,
    auth: Authenticator<S>,
}

impl<S: CredentialStore> SecurityCore<S> {
    pub fn new(config: &SecurityConfig, keys: SecurityKeys, store: S) -> Result<Self, AuthError> {
        Self::with_clock(config, keys, store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: &SecurityConfig,
        keys: SecurityKeys,
        store: S,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthError> {
        let SecurityKeys {
            encryption,
            signing,
        } = keys;
        let codec = Arc::new(FieldCodec::new(&encryption));
        let auth = Authenticator::new(config, signing, store, clock)?;
        Ok(Self { codec, auth })
    }

    pub fn codec(&self) -> &Arc<FieldCodec> {
        &self.codec
    }

    pub fn auth(&self) -> &Authenticator<S> {
        &self.auth
    }

    /// Encrypted upload storage rooted at `root`, sharing this core's codec.
    pub fn file_store(&self, root: impl Into<PathBuf>) -> EncryptedFileStore {
        EncryptedFileStore::new(root, self.codec.clone())
    }
}
