//! AES-256-GCM encryption for persisted fields and file payloads.
//!
//! Wire format v1:
//! [1 byte: version=1][12 bytes: nonce][N bytes: ciphertext + tag]
//! String fields carry the same bytes base64url-encoded (see [`CipherField`]).

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use serde::{Deserialize, Serialize};

use crate::base64url::{base64url_decode, base64url_encode};
use crate::error::CryptoError;
use crate::key::EncryptionKey;
use crate::types::{
    FieldContext, AES_GCM_NONCE_LENGTH, CURRENT_VERSION, MIN_SEALED_LENGTH, SUPPORTED_VERSIONS,
};

/// Ciphertext stored in place of a sensitive attribute.
///
/// Opaque to callers; serializes as a plain string so a persistence layer can
/// store it in a text column unchanged.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CipherField(String);

impl CipherField {
    /// Wrap a value previously produced by [`CipherField::as_str`].
    pub fn from_stored(stored: impl Into<String>) -> Self {
        Self(stored.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for CipherField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CipherField({} chars)", self.0.len())
    }
}

impl fmt::Display for CipherField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generate a random 12-byte nonce for AES-GCM.
fn generate_nonce() -> Result<[u8; AES_GCM_NONCE_LENGTH], CryptoError> {
    let mut nonce = [0u8; AES_GCM_NONCE_LENGTH];
    getrandom::getrandom(&mut nonce).map_err(|e| CryptoError::RngFailed(e.to_string()))?;
    Ok(nonce)
}

/// Stateless authenticated codec for fields and files.
///
/// Holds only the initialized cipher; safe to share across threads and call
/// concurrently without locking.
pub struct FieldCodec {
    cipher: Aes256Gcm,
}

impl FieldCodec {
    pub fn new(key: &EncryptionKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes())),
        }
    }

    /// Seal raw bytes (file payloads) into the binary wire format.
    pub fn encrypt_bytes(
        &self,
        plaintext: &[u8],
        context: Option<&FieldContext>,
    ) -> Result<Vec<u8>, CryptoError> {
        let nonce_bytes = generate_nonce()?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = match context {
            Some(ctx) => {
                let aad = ctx.aad();
                self.cipher.encrypt(
                    nonce,
                    Payload {
                        msg: plaintext,
                        aad: &aad,
                    },
                )
            }
            None => self.cipher.encrypt(nonce, plaintext),
        }
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut sealed = Vec::with_capacity(1 + nonce_bytes.len() + ciphertext.len());
        sealed.push(CURRENT_VERSION);
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Open a binary blob produced by [`FieldCodec::encrypt_bytes`].
    ///
    /// Never returns partial plaintext: a tag mismatch is [`CryptoError::Integrity`].
    pub fn decrypt_bytes(
        &self,
        sealed: &[u8],
        context: Option<&FieldContext>,
    ) -> Result<Vec<u8>, CryptoError> {
        if sealed.len() < MIN_SEALED_LENGTH {
            return Err(CryptoError::Malformed(format!(
                "sealed data too short: {} bytes",
                sealed.len()
            )));
        }

        let version = sealed[0];
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(CryptoError::UnsupportedVersion(version));
        }

        let nonce = Nonce::from_slice(&sealed[1..1 + AES_GCM_NONCE_LENGTH]);
        let ciphertext = &sealed[1 + AES_GCM_NONCE_LENGTH..];

        match context {
            Some(ctx) => {
                let aad = ctx.aad();
                self.cipher.decrypt(
                    nonce,
                    Payload {
                        msg: ciphertext,
                        aad: &aad,
                    },
                )
            }
            None => self.cipher.decrypt(nonce, ciphertext),
        }
        .map_err(|_| {
            tracing::warn!("rejected ciphertext that failed authentication");
            CryptoError::Integrity
        })
    }

    /// Encrypt an attribute value.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<CipherField, CryptoError> {
        self.encrypt_with_context(plaintext, None)
    }

    /// Decrypt an attribute value.
    pub fn decrypt(&self, field: &CipherField) -> Result<Vec<u8>, CryptoError> {
        self.decrypt_with_context(field, None)
    }

    pub fn encrypt_with_context(
        &self,
        plaintext: &[u8],
        context: Option<&FieldContext>,
    ) -> Result<CipherField, CryptoError> {
        let sealed = self.encrypt_bytes(plaintext, context)?;
        Ok(CipherField(base64url_encode(&sealed)))
    }

    pub fn decrypt_with_context(
        &self,
        field: &CipherField,
        context: Option<&FieldContext>,
    ) -> Result<Vec<u8>, CryptoError> {
        let sealed = base64url_decode(&field.0)?;
        self.decrypt_bytes(&sealed, context)
    }

    /// Encrypt a string attribute.
    pub fn encrypt_str(&self, plaintext: &str) -> Result<CipherField, CryptoError> {
        self.encrypt(plaintext.as_bytes())
    }

    /// Decrypt a string attribute, rejecting non-UTF-8 plaintext.
    pub fn decrypt_str(&self, field: &CipherField) -> Result<String, CryptoError> {
        String::from_utf8(self.decrypt(field)?).map_err(|_| CryptoError::InvalidUtf8)
    }
}
