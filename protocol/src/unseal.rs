//! # Secret Unsealing Engine
//!
//! Turns a delivered, sealed secret into a validated [`Secret`]:
//!
//! ```text
//! base64 text ──decode──▶ ciphertext ──OAEP/SHA-256──▶ bytes ──UTF-8──▶ text
//!                                                         │
//!                                            trim, 64 chars, hex alphabet
//!                                                         ▼
//!                                                      Secret
//! ```
//!
//! Pure: nothing is persisted here. Storing the result is the caller's job
//! (see [`crate::authenticator::Provisioner`]), which keeps this testable
//! without a filesystem.
//!
//! Failure categories are kept apart so an operator can tell "you gave me
//! the wrong key" from "the sender encrypted the wrong thing":
//!
//! - transport decoding, UTF-8, length, alphabet → `Format`
//! - wrong key, corrupted ciphertext → `Crypto`

use zeroize::Zeroizing;

use crate::crypto::{oaep, transport, PrivateKey, PublicKey};
use crate::error::{KeywardError, Result};
use crate::secret::Secret;

/// Raw RSA-OAEP ciphertext, after the base64 layer has been removed.
#[derive(Clone, PartialEq, Eq)]
pub struct SealedBlob {
    bytes: Vec<u8>,
}

impl SealedBlob {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Strip the transport encoding.
    pub fn from_base64(text: &str) -> Result<Self> {
        Ok(Self {
            bytes: transport::decode(text)?,
        })
    }

    /// Single-line base64, as it travels over the wire.
    pub fn to_base64(&self) -> String {
        transport::encode(&self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for SealedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealedBlob").field("len", &self.bytes.len()).finish()
    }
}

/// Decrypt and validate a base64-encoded sealed secret.
///
/// # Errors
///
/// - `Format` — bad base64, plaintext not UTF-8, not exactly 64 hex chars.
/// - `Crypto` — wrong private key, corrupted ciphertext, scheme mismatch.
pub fn unseal(sealed: &str, key: &PrivateKey) -> Result<Secret> {
    let blob = SealedBlob::from_base64(sealed)?;
    unseal_blob(&blob, key)
}

/// Same as [`unseal`], for a ciphertext that's already been decoded.
pub fn unseal_blob(blob: &SealedBlob, key: &PrivateKey) -> Result<Secret> {
    tracing::debug!(ciphertext_len = blob.len(), key_bits = key.bits(), "unsealing secret");

    let plaintext = Zeroizing::new(oaep::decrypt(key, blob.as_bytes())?);
    let text = std::str::from_utf8(&plaintext)
        .map_err(|_| KeywardError::format("decrypted secret is not valid UTF-8"))?;

    Secret::parse(text)
}

/// Seal a secret for the holder of `key`. The provisioning side of the
/// exchange; the output is what [`unseal`] consumes.
pub fn seal_secret(secret: &Secret, key: &PublicKey) -> Result<SealedBlob> {
    let bytes = oaep::encrypt(key, secret.as_str().as_bytes())?;
    Ok(SealedBlob { bytes })
}
