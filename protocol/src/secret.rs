//! # Shared Secrets
//!
//! A provisioned secret is 32 bytes of entropy written as 64 lowercase hex
//! characters. [`Secret`] is the only way to hold one, and [`Secret::parse`]
//! is the only way to make one from text, so every boundary crossing (after
//! decryption, after reading the store) runs the same check:
//!
//! 1. trim surrounding whitespace,
//! 2. exactly 64 characters,
//! 3. every character in `0-9a-f` after lowercasing.
//!
//! The canonical form is lowercase. Uppercase input is accepted and
//! normalised right here, at the single creation point, so the store never
//! sees two spellings of the same secret.
//!
//! [`EncodedSecret`] is the same entropy as RFC 4648 base-32, which is what
//! authenticator apps want to be fed. It is derived on demand and never
//! persisted: one source of truth is plenty.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::config::{SECRET_BYTE_LENGTH, SECRET_HEX_LENGTH};
use crate::error::{KeywardError, Result};

/// Base-32 alphabet used for [`EncodedSecret`]. Padding is applied when
/// encoding; decoding accepts it either way.
const BASE32_PADDED: base32::Alphabet = base32::Alphabet::RFC4648 { padding: true };
const BASE32_UNPADDED: base32::Alphabet = base32::Alphabet::RFC4648 { padding: false };

/// A validated 64-character lowercase hex secret.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secret {
    hex: String,
}

impl Secret {
    /// Validate and canonicalise secret text.
    ///
    /// # Errors
    ///
    /// `Format` if the trimmed text isn't 64 characters or contains anything
    /// outside the hex alphabet. The message never echoes the input.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();

        let len = trimmed.chars().count();
        if len != SECRET_HEX_LENGTH {
            return Err(KeywardError::format(format!(
                "secret must be {SECRET_HEX_LENGTH} hex characters, got {len}"
            )));
        }

        let hex = trimmed.to_ascii_lowercase();
        if let Some(pos) = hex.bytes().position(|b| !matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(KeywardError::format(format!(
                "secret contains a non-hex character at position {pos}"
            )));
        }

        Ok(Self { hex })
    }

    /// Wrap 32 raw bytes.
    pub fn from_bytes(bytes: &[u8; SECRET_BYTE_LENGTH]) -> Self {
        Self {
            hex: hex::encode(bytes),
        }
    }

    /// Fresh secret from the OS RNG. Used by provisioning endpoints, not by
    /// the party being provisioned.
    pub fn random() -> Self {
        let mut bytes = Zeroizing::new([0u8; SECRET_BYTE_LENGTH]);
        OsRng.fill_bytes(bytes.as_mut());
        Self::from_bytes(&bytes)
    }

    /// The canonical lowercase hex text.
    pub fn as_str(&self) -> &str {
        &self.hex
    }

    /// Decode the hex into the 32 raw secret bytes.
    pub fn to_bytes(&self) -> Zeroizing<[u8; SECRET_BYTE_LENGTH]> {
        let mut out = Zeroizing::new([0u8; SECRET_BYTE_LENGTH]);
        // Infallible: `parse` and `from_bytes` are the only constructors and
        // both guarantee 64 lowercase hex characters.
        hex::decode_to_slice(&self.hex, out.as_mut())
            .expect("Secret invariant: 64 hex characters");
        out
    }

    /// Re-express the secret as padded base-32.
    pub fn to_encoded(&self) -> EncodedSecret {
        let bytes = self.to_bytes();
        EncodedSecret {
            text: base32::encode(BASE32_PADDED, bytes.as_ref()),
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// A secret in RFC 4648 base-32, padded with `=` to a multiple of 8 symbols.
///
/// 32 bytes don't fill whole 5-byte blocks, so the encoding is 52 symbols
/// followed by `====`. The padding stays on in this type; strip it with
/// [`EncodedSecret::unpadded`] for consumers that don't want it.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct EncodedSecret {
    text: String,
}

impl EncodedSecret {
    /// Accept externally supplied base-32 (case-insensitive, padding
    /// optional, whitespace ignored) and store it in canonical padded form.
    pub fn parse(text: &str) -> Result<Self> {
        let bytes = decode_base32(text)?;
        Ok(Self {
            text: base32::encode(BASE32_PADDED, &bytes),
        })
    }

    /// Padded canonical text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The encoding without trailing `=`.
    pub fn unpadded(&self) -> &str {
        self.text.trim_end_matches('=')
    }

    /// Decode back to raw key bytes.
    pub fn to_bytes(&self) -> Result<Zeroizing<Vec<u8>>> {
        decode_base32(&self.text)
    }
}

impl fmt::Debug for EncodedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncodedSecret(<redacted>)")
    }
}

fn decode_base32(text: &str) -> Result<Zeroizing<Vec<u8>>> {
    let normalized: Zeroizing<String> = Zeroizing::new(
        text.chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect::<String>()
            .trim_end_matches('=')
            .to_ascii_uppercase(),
    );

    if normalized.is_empty() {
        return Err(KeywardError::format("empty base-32 secret"));
    }
    if !normalized.bytes().all(|b| matches!(b, b'A'..=b'Z' | b'2'..=b'7')) {
        return Err(KeywardError::format("base-32 secret contains invalid characters"));
    }
    // Lengths of 1, 3 and 6 mod 8 can't come out of any byte string.
    if matches!(normalized.len() % 8, 1 | 3 | 6) {
        return Err(KeywardError::format("base-32 secret has an impossible length"));
    }

    base32::decode(BASE32_UNPADDED, &normalized)
        .map(Zeroizing::new)
        .ok_or_else(|| KeywardError::format("base-32 secret failed to decode"))
}
