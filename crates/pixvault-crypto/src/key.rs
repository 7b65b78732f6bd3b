//! Process-wide field encryption key.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::base64url::{base64url_decode, base64url_encode};
use crate::error::CryptoError;
use crate::hkdf::{hkdf_derive, DERIVATION_SALT, FIELD_ENCRYPTION_INFO};
use crate::types::AES_KEY_LENGTH;

/// 256-bit symmetric key used by [`FieldCodec`](crate::FieldCodec).
///
/// Loaded once at startup and held for the process lifetime. The bytes are
/// wiped on drop and never appear in `Debug` output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; AES_KEY_LENGTH]);

impl EncryptionKey {
    /// Wrap raw key bytes. Anything other than 32 bytes is rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; AES_KEY_LENGTH] =
            bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: AES_KEY_LENGTH,
                got: bytes.len(),
            })?;
        Ok(Self(key))
    }

    /// Parse a base64url key as produced by [`EncryptionKey::to_base64url`].
    pub fn from_base64url(encoded: &str) -> Result<Self, CryptoError> {
        let mut bytes = base64url_decode(encoded.trim())?;
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    /// Derive the field encryption key from a master secret.
    pub fn derive(master: &[u8]) -> Result<Self, CryptoError> {
        let mut okm = hkdf_derive(master, DERIVATION_SALT, FIELD_ENCRYPTION_INFO)?;
        let key = Self(okm);
        okm.zeroize();
        Ok(key)
    }

    /// Generate a fresh random key.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut key = [0u8; AES_KEY_LENGTH];
        getrandom::getrandom(&mut key).map_err(|e| CryptoError::RngFailed(e.to_string()))?;
        Ok(Self(key))
    }

    pub fn to_base64url(&self) -> String {
        base64url_encode(&self.0)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; AES_KEY_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}
