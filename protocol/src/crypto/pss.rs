//! # RSA-PSS Signatures
//!
//! Probabilistic signatures with SHA-256, MGF1(SHA-256), and the largest salt
//! the key allows. Same message, same key, different signature every time.
//! That is the point of PSS, not a bug in the tests.
//!
//! The maximum salt length is `ceil((modBits - 1) / 8) - hLen - 2`, i.e. 222
//! bytes for a 2048-bit key. Verifiers that auto-detect the salt and
//! verifiers that insist on the maximum both accept what we produce.

use rand::rngs::OsRng;
use rsa::Pss;
use sha2::{Digest, Sha256};

use super::keys::{PrivateKey, PublicKey};
use crate::config::pss_max_salt_len;
use crate::error::Result;

/// Salt length used for a key of `bits` bits.
pub fn salt_len(bits: usize) -> usize {
    pss_max_salt_len(bits)
}

/// Sign `message` (hashed internally with SHA-256).
pub fn sign(key: &PrivateKey, message: &[u8]) -> Result<Vec<u8>> {
    let digest = Sha256::digest(message);
    let scheme = Pss::new_with_salt::<Sha256>(salt_len(key.bits()));
    let signature = key.as_rsa().sign_with_rng(&mut OsRng, scheme, &digest)?;
    Ok(signature)
}

/// Verify a PSS signature. `false` for anything short of a valid signature
/// over exactly these bytes by exactly this key.
pub fn verify(key: &PublicKey, message: &[u8], signature: &[u8]) -> bool {
    if signature.len() != key.size() {
        return false;
    }
    let digest = Sha256::digest(message);
    let scheme = Pss::new_with_salt::<Sha256>(salt_len(key.bits()));
    key.as_rsa().verify(scheme, &digest, signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prover() -> PrivateKey {
        PrivateKey::from_pem(include_str!("../../tests/fixtures/prover_private.pem")).unwrap()
    }

    #[test]
    fn test_sign_and_verify() {
        let key = prover();
        let sig = sign(&key, b"hello, world").unwrap();
        assert_eq!(sig.len(), key.size());
        assert!(verify(&key.public_key(), b"hello, world", &sig));
    }

    #[test]
    fn test_signatures_are_salted() {
        let key = prover();
        let a = sign(&key, b"same message").unwrap();
        let b = sign(&key, b"same message").unwrap();
        assert_ne!(a, b);
        assert!(verify(&key.public_key(), b"same message", &a));
        assert!(verify(&key.public_key(), b"same message", &b));
    }

    #[test]
    fn test_wrong_message_fails() {
        let key = prover();
        let sig = sign(&key, b"correct message").unwrap();
        assert!(!verify(&key.public_key(), b"correct messagf", &sig));
    }

    #[test]
    fn test_wrong_key_fails() {
        let key = prover();
        let other =
            PublicKey::from_pem(include_str!("../../tests/fixtures/stranger_public.pem")).unwrap();
        let sig = sign(&key, b"message").unwrap();
        assert!(!verify(&other, b"message", &sig));
    }

    #[test]
    fn test_malformed_signature_is_false_not_panic() {
        let key = prover().public_key();
        assert!(!verify(&key, b"message", &[]));
        assert!(!verify(&key, b"message", &[0u8; 256]));
        assert!(!verify(&key, b"message", &[0xFFu8; 300]));
    }

    #[test]
    fn test_salt_len_for_fixture_key() {
        assert_eq!(salt_len(prover().bits()), 222);
    }
}
