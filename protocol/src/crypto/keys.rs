//! # Key Material
//!
//! RSA key pairs loaded from PEM, as opaque handles.
//!
//! The private and public halves are separate types on purpose. A
//! [`PrivateKey`] can decrypt and sign, a [`PublicKey`] can encrypt and
//! verify, and the compiler refuses every other combination. "I passed the
//! wrong half" is a bug class we'd rather not have at runtime.
//!
//! ## Accepted formats
//!
//! Both PEM flavours that real tooling emits:
//!
//! - PKCS#8 / SPKI: `BEGIN PRIVATE KEY`, `BEGIN PUBLIC KEY` (OpenSSL 3 default)
//! - PKCS#1: `BEGIN RSA PRIVATE KEY`, `BEGIN RSA PUBLIC KEY` (older tooling)
//!
//! Passphrase-protected keys are not supported. Keys smaller than
//! [`MIN_RSA_MODULUS_BITS`] are rejected at load time.
//!
//! ## Security considerations
//!
//! Key bytes are never logged and never appear in `Debug` output. The `rsa`
//! crate zeroizes private key components on drop.

use std::fmt;
use std::path::Path;

use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

use crate::config::MIN_RSA_MODULUS_BITS;
use crate::error::{KeywardError, Result};

const PKCS1_PRIVATE_TAG: &str = "BEGIN RSA PRIVATE KEY";
const PKCS1_PUBLIC_TAG: &str = "BEGIN RSA PUBLIC KEY";

/// The private half of an RSA key pair. Decrypts and signs.
#[derive(Clone)]
pub struct PrivateKey {
    inner: RsaPrivateKey,
}

/// The public half of an RSA key pair. Encrypts and verifies.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    inner: RsaPublicKey,
}

impl PrivateKey {
    /// Generate a fresh key pair from the OS RNG.
    ///
    /// Slow for large moduli (a 4096-bit key can take seconds). That's the
    /// price of primes.
    pub fn generate(bits: usize) -> Result<Self> {
        if bits < MIN_RSA_MODULUS_BITS {
            return Err(KeywardError::crypto(format!(
                "refusing to generate a {bits}-bit key (minimum {MIN_RSA_MODULUS_BITS})"
            )));
        }
        let inner = RsaPrivateKey::new(&mut OsRng, bits)?;
        Ok(Self { inner })
    }

    /// Parse a PEM-encoded private key (PKCS#8 or PKCS#1).
    pub fn from_pem(pem: &str) -> Result<Self> {
        let inner = if pem.contains(PKCS1_PRIVATE_TAG) {
            RsaPrivateKey::from_pkcs1_pem(pem)
                .map_err(|e| KeywardError::crypto(format!("invalid PKCS#1 private key: {e}")))?
        } else {
            RsaPrivateKey::from_pkcs8_pem(pem)
                .map_err(|e| KeywardError::crypto(format!("invalid PKCS#8 private key: {e}")))?
        };
        inner.validate()?;
        check_modulus(inner.n().bits())?;
        Ok(Self { inner })
    }

    /// Read and parse a PEM private key file.
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let pem = Zeroizing::new(std::fs::read_to_string(path).map_err(|e| {
            KeywardError::Storage(format!("cannot read private key {}: {e}", path.display()))
        })?);
        Self::from_pem(&pem)
    }

    /// Export as PKCS#8 PEM. The returned string is wiped on drop.
    pub fn to_pem(&self) -> Result<Zeroizing<String>> {
        self.inner
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| KeywardError::crypto(format!("private key encoding failed: {e}")))
    }

    /// Derive the matching public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            inner: self.inner.to_public_key(),
        }
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.inner.n().bits()
    }

    /// Modulus size in bytes (also the ciphertext and signature length).
    pub fn size(&self) -> usize {
        self.inner.size()
    }

    pub(crate) fn as_rsa(&self) -> &RsaPrivateKey {
        &self.inner
    }
}

impl PublicKey {
    /// Parse a PEM-encoded public key (SPKI or PKCS#1).
    pub fn from_pem(pem: &str) -> Result<Self> {
        let inner = if pem.contains(PKCS1_PUBLIC_TAG) {
            RsaPublicKey::from_pkcs1_pem(pem)
                .map_err(|e| KeywardError::crypto(format!("invalid PKCS#1 public key: {e}")))?
        } else {
            RsaPublicKey::from_public_key_pem(pem)
                .map_err(|e| KeywardError::crypto(format!("invalid SPKI public key: {e}")))?
        };
        check_modulus(inner.n().bits())?;
        Ok(Self { inner })
    }

    /// Read and parse a PEM public key file.
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let pem = std::fs::read_to_string(path).map_err(|e| {
            KeywardError::Storage(format!("cannot read public key {}: {e}", path.display()))
        })?;
        Self::from_pem(&pem)
    }

    /// Export as SPKI PEM (`BEGIN PUBLIC KEY`).
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| KeywardError::crypto(format!("public key encoding failed: {e}")))
    }

    pub fn bits(&self) -> usize {
        self.inner.n().bits()
    }

    pub fn size(&self) -> usize {
        self.inner.size()
    }

    pub(crate) fn as_rsa(&self) -> &RsaPublicKey {
        &self.inner
    }
}

fn check_modulus(bits: usize) -> Result<()> {
    if bits < MIN_RSA_MODULUS_BITS {
        return Err(KeywardError::crypto(format!(
            "RSA modulus of {bits} bits is below the {MIN_RSA_MODULUS_BITS}-bit minimum"
        )));
    }
    Ok(())
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}
