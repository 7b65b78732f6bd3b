//! Encrypted-at-rest file storage for uploaded payloads.
//!
//! Files are sealed with [`FieldCodec::encrypt_bytes`] and written as
//! `<root>/enc_<name>`. Writes are staged in a temp file and moved into
//! place without replacing an existing file. Deletes are idempotent.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::codec::FieldCodec;
use crate::error::CryptoError;

/// Prefix applied to every stored file name.
pub const ENCRYPTED_FILE_PREFIX: &str = "enc_";

pub struct EncryptedFileStore {
    root: PathBuf,
    codec: Arc<FieldCodec>,
}

impl EncryptedFileStore {
    pub fn new(root: impl Into<PathBuf>, codec: Arc<FieldCodec>) -> Self {
        Self {
            root: root.into(),
            codec,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Encrypt `plaintext` and write it under a new file. Returns the stored path.
    ///
    /// Fails with [`CryptoError::AlreadyExists`] instead of overwriting.
    pub fn save(&self, name: &str, plaintext: &[u8]) -> Result<PathBuf, CryptoError> {
        validate_file_name(name)?;
        fs::create_dir_all(&self.root)?;

        let path = self.root.join(format!("{}{}", ENCRYPTED_FILE_PREFIX, name));
        let sealed = self.codec.encrypt_bytes(plaintext, None)?;

        self.write_new(&path, |file| file.write_all(&sealed))?;

        debug!(path = %path.display(), bytes = sealed.len(), "stored encrypted file");
        Ok(path)
    }

    /// Read and decrypt a stored file.
    ///
    /// Storage failures surface as [`CryptoError::Io`]; tampering as
    /// [`CryptoError::Integrity`].
    pub fn read(&self, path: &Path) -> Result<Vec<u8>, CryptoError> {
        self.ensure_inside_root(path)?;
        let mut sealed = Vec::new();
        File::open(path)?.read_to_end(&mut sealed)?;
        self.codec.decrypt_bytes(&sealed, None)
    }

    /// Remove a stored file. Returns `false` when there was nothing to delete.
    pub fn delete(&self, path: &Path) -> Result<bool, CryptoError> {
        self.ensure_inside_root(path)?;
        match fs::remove_file(path) {
            Ok(()) => {
                info!(path = %path.display(), "deleted encrypted file");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "nothing to delete");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stage the contents in a temp file under the root, then move it to
    /// `path` without replacing anything already there. A failed write leaves
    /// no file behind.
    fn write_new(
        &self,
        path: &Path,
        write: impl FnOnce(&mut File) -> io::Result<()>,
    ) -> Result<(), CryptoError> {
        let mut staged = NamedTempFile::new_in(&self.root)?;
        write(staged.as_file_mut())?;
        staged.as_file().sync_all()?;
        staged.persist_noclobber(path).map_err(|e| {
            if e.error.kind() == io::ErrorKind::AlreadyExists {
                CryptoError::AlreadyExists(path.display().to_string())
            } else {
                CryptoError::Io(e.error)
            }
        })?;
        Ok(())
    }

    fn ensure_inside_root(&self, path: &Path) -> Result<(), CryptoError> {
        let inside = path.parent() == Some(self.root.as_path())
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(ENCRYPTED_FILE_PREFIX));
        if inside {
            Ok(())
        } else {
            Err(CryptoError::InvalidFileName(path.display().to_string()))
        }
    }
}

/// A stored name must be a single plain path component.
fn validate_file_name(name: &str) -> Result<(), CryptoError> {
    let invalid = || CryptoError::InvalidFileName(name.to_string());
    if name.is_empty() || name.contains('\0') || name.contains('/') || name.contains('\\') {
        return Err(invalid());
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid()),
    }
}
