//! # Proof Generator
//!
//! Proves control of the prover's key over a cleartext value (in practice a
//! git commit id) using sign-then-encrypt:
//!
//! 1. **attest**: RSA-PSS sign the UTF-8 message with the *prover's* private
//!    key. Authenticity is bound to the prover.
//! 2. **seal**: RSA-OAEP encrypt that signature for the *recipient's*
//!    public key. Confidentiality is bound to the recipient.
//!
//! The recipient opens the artifact with their private key, then checks the
//! recovered signature against the prover's known public key. An
//! eavesdropper learns the commit id (it's sent in the clear anyway) and
//! nothing else.
//!
//! ## Size gotcha
//!
//! The signature is as long as the *prover's* modulus, and OAEP can only
//! carry `recipient_modulus - 66` bytes. A 2048-bit prover therefore needs a
//! recipient of at least ~2600 bits; 3072 or 4096 in practice. Pairing two
//! 2048-bit keys fails in [`seal`] with a `Crypto` error that names both
//! sizes.

use std::fmt;

use crate::config::COMMIT_ID_LENGTH;
use crate::crypto::{oaep, pss, transport, PrivateKey, PublicKey};
use crate::error::{KeywardError, Result};

// ---------------------------------------------------------------------------
// Commit Identifier
// ---------------------------------------------------------------------------

/// A 40-character hex commit id, canonical lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommitId(String);

impl CommitId {
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.len() != COMMIT_ID_LENGTH || !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(KeywardError::format(format!(
                "commit id must be {COMMIT_ID_LENGTH} hex characters"
            )));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Attestation
// ---------------------------------------------------------------------------

/// A PSS signature over a cleartext message.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedAttestation {
    signature: Vec<u8>,
}

impl SignedAttestation {
    pub fn from_bytes(signature: Vec<u8>) -> Self {
        Self { signature }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.signature
    }

    pub fn to_base64(&self) -> String {
        transport::encode(&self.signature)
    }

    /// Check this attestation against the signer's public key and the exact
    /// message bytes that were signed.
    pub fn verify(&self, message: &str, signer: &PublicKey) -> bool {
        pss::verify(signer, message.as_bytes(), &self.signature)
    }
}

impl fmt::Debug for SignedAttestation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedAttestation")
            .field("len", &self.signature.len())
            .finish()
    }
}

/// Sign `message` with the prover's key.
///
/// Not reproducible bit-for-bit: PSS salts every signature.
pub fn attest(message: &str, signer: &PrivateKey) -> Result<SignedAttestation> {
    let signature = pss::sign(signer, message.as_bytes())?;
    Ok(SignedAttestation { signature })
}

// ---------------------------------------------------------------------------
// Sealed Artifact
// ---------------------------------------------------------------------------

/// A [`SignedAttestation`] encrypted for one recipient.
#[derive(Clone, PartialEq, Eq)]
pub struct ProofArtifact {
    ciphertext: Vec<u8>,
}

impl ProofArtifact {
    /// Single-line base64. No wrapping, ever: the output format is one line
    /// per field.
    pub fn to_base64(&self) -> String {
        transport::encode(&self.ciphertext)
    }

    pub fn from_base64(text: &str) -> Result<Self> {
        Ok(Self {
            ciphertext: transport::decode(text)?,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.ciphertext
    }
}

impl fmt::Debug for ProofArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProofArtifact")
            .field("len", &self.ciphertext.len())
            .finish()
    }
}

/// Encrypt an attestation for `recipient`.
pub fn seal(attestation: &SignedAttestation, recipient: &PublicKey) -> Result<ProofArtifact> {
    let ceiling = oaep::max_plaintext_len(recipient);
    if attestation.signature.len() > ceiling {
        return Err(KeywardError::crypto(format!(
            "{}-byte signature does not fit a {}-bit recipient key (OAEP/SHA-256 ceiling {ceiling} bytes)",
            attestation.signature.len(),
            recipient.bits(),
        )));
    }
    let ciphertext = oaep::encrypt(recipient, &attestation.signature)?;
    Ok(ProofArtifact { ciphertext })
}

/// Recipient side: recover the attestation from a sealed artifact.
pub fn open(artifact: &ProofArtifact, recipient: &PrivateKey) -> Result<SignedAttestation> {
    let signature = oaep::decrypt(recipient, &artifact.ciphertext)?;
    Ok(SignedAttestation { signature })
}

// ---------------------------------------------------------------------------
// Two-line Proof
// ---------------------------------------------------------------------------

/// A commit id together with its sealed attestation.
#[derive(Debug, Clone)]
pub struct Proof {
    pub commit: CommitId,
    pub artifact: ProofArtifact,
}

impl Proof {
    /// Attest `commit` with `signer` and seal it for `recipient`.
    pub fn generate(commit: CommitId, signer: &PrivateKey, recipient: &PublicKey) -> Result<Self> {
        let attestation = attest(commit.as_str(), signer)?;
        let artifact = seal(&attestation, recipient)?;
        tracing::info!(
            commit = %commit,
            signer_bits = signer.bits(),
            recipient_bits = recipient.bits(),
            "proof generated"
        );
        Ok(Self { commit, artifact })
    }

    /// Two lines: the commit id, then the base64 artifact.
    pub fn render(&self) -> String {
        format!("{}\n{}\n", self.commit, self.artifact.to_base64())
    }

    /// Recipient side: open the artifact and check it against the prover's
    /// public key.
    pub fn verify(&self, recipient: &PrivateKey, signer: &PublicKey) -> Result<bool> {
        let attestation = open(&self.artifact, recipient)?;
        Ok(attestation.verify(self.commit.as_str(), signer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMMIT: &str = "4f2a9c1d8e7b6a5f4e3d2c1b0a9f8e7d6c5b4a39";

    fn prover() -> PrivateKey {
        PrivateKey::from_pem(include_str!("../tests/fixtures/prover_private.pem")).unwrap()
    }

    fn recipient() -> PrivateKey {
        PrivateKey::from_pem(include_str!("../tests/fixtures/recipient_private.pem")).unwrap()
    }

    #[test]
    fn test_commit_id_validation() {
        assert_eq!(CommitId::parse(COMMIT).unwrap().as_str(), COMMIT);
        assert_eq!(
            CommitId::parse(&format!(" {}\n", COMMIT.to_uppercase())).unwrap().as_str(),
            COMMIT
        );
        assert_eq!(CommitId::parse(&COMMIT[..39]).unwrap_err().kind(), "format");
        assert_eq!(
            CommitId::parse(&format!("{}x", &COMMIT[..39])).unwrap_err().kind(),
            "format"
        );
    }

    #[test]
    fn test_attest_and_verify() {
        let key = prover();
        let attestation = attest(COMMIT, &key).unwrap();
        assert!(attestation.verify(COMMIT, &key.public_key()));
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let signer = prover();
        let recipient = recipient();
        let attestation = attest(COMMIT, &signer).unwrap();

        let artifact = seal(&attestation, &recipient.public_key()).unwrap();
        assert_eq!(artifact.as_bytes().len(), recipient.size());

        let opened = open(&artifact, &recipient).unwrap();
        assert_eq!(opened, attestation);
        assert!(opened.verify(COMMIT, &signer.public_key()));
    }

    #[test]
    fn test_signature_too_large_for_recipient() {
        // 2048-bit signature, 2048-bit recipient: 256 bytes > 190 byte ceiling.
        let signer = prover();
        let attestation = attest(COMMIT, &signer).unwrap();
        let err = seal(&attestation, &signer.public_key()).unwrap_err();
        assert_eq!(err.kind(), "crypto");
        assert!(err.to_string().contains("does not fit"));
    }

    #[test]
    fn test_render_is_two_lines() {
        let proof = Proof::generate(
            CommitId::parse(COMMIT).unwrap(),
            &prover(),
            &recipient().public_key(),
        )
        .unwrap();

        let rendered = proof.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], COMMIT);
        assert_eq!(ProofArtifact::from_base64(lines[1]).unwrap(), proof.artifact);
    }

    #[test]
    fn test_proof_verify_uses_both_keys() {
        let signer = prover();
        let recipient = recipient();
        let proof =
            Proof::generate(CommitId::parse(COMMIT).unwrap(), &signer, &recipient.public_key())
                .unwrap();
        assert!(proof.verify(&recipient, &signer.public_key()).unwrap());

        // Opening with the signer's own key is a decryption failure.
        assert!(proof.verify(&signer, &signer.public_key()).is_err());
    }
}
