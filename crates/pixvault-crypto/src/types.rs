/// Wire format version for sealed fields and files.
///
/// Version 1: AES-256-GCM, random nonce per seal
/// Format: [version=1:1B][nonce:12B][ciphertext+tag]
pub const CURRENT_VERSION: u8 = 1;

/// Supported wire format versions (for decryption).
pub const SUPPORTED_VERSIONS: &[u8] = &[1];

/// AES-GCM nonce length in bytes (96 bits per NIST recommendation).
pub const AES_GCM_NONCE_LENGTH: usize = 12;

/// AES-GCM tag length in bytes (128 bits).
pub const AES_GCM_TAG_LENGTH: usize = 16;

/// AES key length in bytes (256 bits).
pub const AES_KEY_LENGTH: usize = 32;

/// Smallest well-formed sealed blob: version + nonce + tag over empty plaintext.
pub const MIN_SEALED_LENGTH: usize = 1 + AES_GCM_NONCE_LENGTH + AES_GCM_TAG_LENGTH;

/// Binds a ciphertext to the attribute it was written to via AAD.
///
/// A value sealed for `users.email` will not open as `images.description`,
/// so ciphertexts cannot be swapped between columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldContext {
    /// Entity (table) name.
    pub entity: String,
    /// Attribute (column) name.
    pub attribute: String,
}

impl FieldContext {
    pub fn new(entity: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            attribute: attribute.into(),
        }
    }

    /// Format: [4 bytes: entity length (u32 BE)][entity UTF-8][attribute UTF-8]
    pub(crate) fn aad(&self) -> Vec<u8> {
        let entity = self.entity.as_bytes();
        let attribute = self.attribute.as_bytes();
        let mut aad = Vec::with_capacity(4 + entity.len() + attribute.len());
        aad.extend_from_slice(&(entity.len() as u32).to_be_bytes());
        aad.extend_from_slice(entity);
        aad.extend_from_slice(attribute);
        aad
    }
}
