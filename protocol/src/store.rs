//! # Secret Store
//!
//! Where the provisioned secret lives between requests.
//!
//! The OTP side re-reads the secret on every call, the provisioning side
//! replaces it wholesale. That's a single-writer / many-reader setup, and the
//! only thing it needs from the file backend is that a reader never sees a
//! half-written secret. [`FileSecretStore::store`] gets that from the classic
//! write-to-temp, fsync, rename dance: `rename(2)` within one directory is
//! atomic, so readers see either the old file or the new one.
//!
//! Every `load` runs the content back through [`Secret::parse`]. A file that
//! someone edited by hand gets the same scrutiny as a freshly decrypted one.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tempfile::NamedTempFile;
use zeroize::Zeroizing;

use crate::error::{KeywardError, Result};
use crate::secret::Secret;

/// Persistence for the one provisioned secret.
pub trait SecretStore: Send + Sync {
    /// `Ok(None)` when nothing has been provisioned yet.
    fn load(&self) -> Result<Option<Secret>>;

    /// Replace the stored secret atomically.
    fn store(&self, secret: &Secret) -> Result<()>;
}

// ---------------------------------------------------------------------------
// File Backend
// ---------------------------------------------------------------------------

/// A secret stored as the sole content of a file, canonical hex, no newline.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SecretStore for FileSecretStore {
    fn load(&self) -> Result<Option<Secret>> {
        let raw = match fs::read(&self.path) {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(KeywardError::Storage(format!(
                    "cannot read secret file {}: {e}",
                    self.path.display()
                )))
            }
        };
        // A corrupt record is a format problem, not an I/O one.
        let contents = std::str::from_utf8(&raw)
            .map_err(|_| KeywardError::format("secret file is not valid UTF-8"))?;
        Secret::parse(contents).map(Some)
    }

    fn store(&self, secret: &Secret) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        // Same directory as the target so the rename can't cross filesystems.
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(secret.as_str().as_bytes())?;
        tmp.as_file().sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600))?;
        }

        tmp.persist(&self.path).map_err(|e| {
            KeywardError::Storage(format!(
                "cannot replace secret file {}: {}",
                self.path.display(),
                e.error
            ))
        })?;

        tracing::debug!(path = %self.path.display(), "secret persisted");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory Backend
// ---------------------------------------------------------------------------

/// Process-local store. For tests and for embedding without a filesystem.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    slot: RwLock<Option<Secret>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(secret: Secret) -> Self {
        Self {
            slot: RwLock::new(Some(secret)),
        }
    }
}

impl SecretStore for MemorySecretStore {
    fn load(&self) -> Result<Option<Secret>> {
        Ok(self.slot.read().clone())
    }

    fn store(&self, secret: &Secret) -> Result<()> {
        *self.slot.write() = Some(secret.clone());
        Ok(())
    }
}

impl<T: SecretStore + ?Sized> SecretStore for std::sync::Arc<T> {
    fn load(&self) -> Result<Option<Secret>> {
        (**self).load()
    }

    fn store(&self, secret: &Secret) -> Result<()> {
        (**self).store(secret)
    }
}
