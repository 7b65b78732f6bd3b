use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Malformed ciphertext: {0}")]
    Malformed(String),

    #[error("Unsupported ciphertext version: {0}")]
    UnsupportedVersion(u8),

    /// Authentication tag mismatch: the ciphertext was altered or sealed under another key.
    #[error("Integrity check failed: ciphertext was tampered with or encrypted under a different key")]
    Integrity,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decrypted field is not valid UTF-8")]
    InvalidUtf8,

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error("Refusing to overwrite existing encrypted file: {0}")]
    AlreadyExists(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Random number generation failed: {0}")]
    RngFailed(String),
}

impl CryptoError {
    /// True when stored ciphertext was rejected as not authentic: a failed tag,
    /// an altered version byte, or truncated or garbled data. Storage faults
    /// (`Io`) are never integrity errors.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            CryptoError::Integrity | CryptoError::UnsupportedVersion(_) | CryptoError::Malformed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_ciphertext_kinds_are_integrity_errors() {
        assert!(CryptoError::Integrity.is_integrity());
        assert!(CryptoError::UnsupportedVersion(0).is_integrity());
        assert!(CryptoError::Malformed("sealed data too short".into()).is_integrity());
    }

    #[test]
    fn storage_faults_are_not_integrity_errors() {
        let io = std::io::Error::other("disk gone");
        assert!(!CryptoError::Io(io).is_integrity());
        assert!(!CryptoError::AlreadyExists("enc_a".into()).is_integrity());
    }
}
