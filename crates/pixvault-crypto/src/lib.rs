//! Field encryption core: AES-256-GCM codec, key material, and encrypted file storage.

pub mod base64url;
pub mod codec;
pub mod error;
pub mod file_store;
pub mod hkdf;
pub mod key;
pub mod types;

pub use base64url::{base64url_decode, base64url_encode};
pub use codec::{CipherField, FieldCodec};
pub use error::CryptoError;
pub use file_store::{EncryptedFileStore, ENCRYPTED_FILE_PREFIX};
pub use hkdf::{hkdf_derive, DERIVATION_SALT, FIELD_ENCRYPTION_INFO, TOKEN_SIGNING_INFO};
pub use key::EncryptionKey;
pub use types::{FieldContext, CURRENT_VERSION, SUPPORTED_VERSIONS};
