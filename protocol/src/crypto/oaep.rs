//! # RSA-OAEP Encryption
//!
//! Asymmetric sealing for Keyward: provisioning secrets and proof artifacts
//! both travel as RSA-OAEP ciphertexts.
//!
//! ## Parameters
//!
//! One configuration, used everywhere, never negotiated:
//!
//! - digest: SHA-256
//! - mask generation: MGF1 with SHA-256
//! - label: none
//!
//! Mixing digests between the OAEP hash and the MGF is legal and is also the
//! number one reason two otherwise-correct implementations fail to interop.
//! Pinning both to SHA-256 keeps us compatible with the common
//! `OAEP(MGF1(SHA256), SHA256, label=None)` configuration.
//!
//! ## Size ceiling
//!
//! OAEP can carry at most `k - 2*hLen - 2` bytes under a `k`-byte modulus:
//! 190 bytes for 2048-bit keys, 318 for 3072, 446 for 4096. We check that
//! up front so the error says which numbers didn't fit.
//!
//! Decryption is all-or-nothing: a wrong key or a flipped bit yields an
//! error, never a truncated or garbled plaintext.

use rand::rngs::OsRng;
use rsa::Oaep;
use sha2::Sha256;

use super::keys::{PrivateKey, PublicKey};
use crate::config::oaep_max_plaintext_len;
use crate::error::{KeywardError, Result};

fn padding() -> Oaep {
    Oaep::new::<Sha256>()
}

/// Largest plaintext the given public key can seal.
pub fn max_plaintext_len(key: &PublicKey) -> usize {
    oaep_max_plaintext_len(key.size())
}

/// Encrypt `plaintext` for the holder of the matching private key.
///
/// Output is exactly `key.size()` bytes and differs on every call (OAEP
/// draws a fresh random seed each time).
pub fn encrypt(key: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let ceiling = max_plaintext_len(key);
    if plaintext.len() > ceiling {
        return Err(KeywardError::crypto(format!(
            "message too long for RSA-OAEP/SHA-256: {} bytes, {}-bit key carries at most {ceiling}",
            plaintext.len(),
            key.bits(),
        )));
    }

    key.as_rsa()
        .encrypt(&mut OsRng, padding(), plaintext)
        .map_err(KeywardError::from)
}

/// Decrypt an OAEP ciphertext.
///
/// # Errors
///
/// `Crypto` when the ciphertext length doesn't match the modulus, the key is
/// wrong, or the padding check fails. We don't say which.
pub fn decrypt(key: &PrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() != key.size() {
        return Err(KeywardError::crypto(format!(
            "ciphertext is {} bytes, expected {} for a {}-bit key",
            ciphertext.len(),
            key.size(),
            key.bits(),
        )));
    }

    // Blinded decryption: the RNG randomises the private-key operation so
    // its timing doesn't track the ciphertext.
    key.as_rsa()
        .decrypt_blinded(&mut OsRng, padding(), ciphertext)
        .map_err(|_| KeywardError::crypto("decryption failed -- wrong key or corrupted ciphertext"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prover() -> PrivateKey {
        PrivateKey::from_pem(include_str!("../../tests/fixtures/prover_private.pem")).unwrap()
    }

    fn stranger() -> PrivateKey {
        PrivateKey::from_pem(include_str!("../../tests/fixtures/stranger_private.pem")).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = prover();
        let sealed = encrypt(&key.public_key(), b"open sesame").unwrap();
        assert_eq!(sealed.len(), key.size());
        assert_eq!(decrypt(&key, &sealed).unwrap(), b"open sesame");
    }

    #[test]
    fn test_ciphertexts_are_randomised() {
        let key = prover().public_key();
        let a = encrypt(&key, b"same input").unwrap();
        let b = encrypt(&key, b"same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = encrypt(&prover().public_key(), b"for the prover only").unwrap();
        let err = decrypt(&stranger(), &sealed).unwrap_err();
        assert_eq!(err.kind(), "crypto");
    }

    #[test]
    fn test_flipped_bit_fails() {
        let key = prover();
        let mut sealed = encrypt(&key.public_key(), b"integrity").unwrap();
        sealed[100] ^= 0x01;
        assert!(decrypt(&key, &sealed).is_err());
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let key = prover();
        let sealed = encrypt(&key.public_key(), b"integrity").unwrap();
        assert!(decrypt(&key, &sealed[..sealed.len() - 1]).is_err());
        assert!(decrypt(&key, &[]).is_err());
    }

    #[test]
    fn test_ceiling_is_exact() {
        let key = prover().public_key();
        let ceiling = max_plaintext_len(&key);
        assert_eq!(ceiling, 190);
        assert!(encrypt(&key, &vec![0x41; ceiling]).is_ok());

        let err = encrypt(&key, &vec![0x41; ceiling + 1]).unwrap_err();
        assert_eq!(err.kind(), "crypto");
        assert!(err.to_string().contains("message too long"));
    }

    #[test]
    fn test_empty_plaintext() {
        let key = prover();
        let sealed = encrypt(&key.public_key(), b"").unwrap();
        assert!(decrypt(&key, &sealed).unwrap().is_empty());
    }
}
