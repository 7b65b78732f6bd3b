//! HKDF-SHA256 key derivation.
//!
//! Lets a deployment hold one master secret and split it into independent
//! keys per purpose (field encryption, token signing).

use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::CryptoError;
use crate::types::AES_KEY_LENGTH;

/// Fixed salt for purpose-separated key derivation.
pub const DERIVATION_SALT: &[u8] = b"pixvault-key-derivation-v1";

/// Info label for the field encryption key.
pub const FIELD_ENCRYPTION_INFO: &[u8] = b"pixvault:field-encryption:v1";

/// Info label for the bearer token signing secret.
pub const TOKEN_SIGNING_INFO: &[u8] = b"pixvault:token-signing:v1";

/// Derive a 256-bit key using HKDF-SHA256.
///
/// # Arguments
/// * `ikm` - Input keying material
/// * `salt` - Salt for domain separation
/// * `info` - Purpose label
pub fn hkdf_derive(
    ikm: &[u8],
    salt: &[u8],
    info: &[u8],
) -> Result<[u8; AES_KEY_LENGTH], CryptoError> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = [0u8; AES_KEY_LENGTH];
    hk.expand(info, &mut okm)
        .map_err(|e| CryptoError::KeyDerivation(format!("HKDF expand failed: {}", e)))?;
    Ok(okm)
}
