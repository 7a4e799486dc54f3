// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Keyward Protocol — Core Library
//!
//! Keyward provisions a shared secret to one party over RSA, lets that party
//! prove control of its key with a signed-and-sealed commitment, and then
//! runs a TOTP authenticator against the provisioned secret.
//!
//! Three components, each depending only on key material and none on each
//! other:
//!
//! - **unseal** — RSA-OAEP decryption of a delivered secret, followed by a
//!   strict 64-hex-character format check.
//! - **proof** — RSA-PSS attestation of a cleartext value, sealed with
//!   RSA-OAEP for a designated recipient.
//! - **totp** — RFC 6238 code generation and windowed verification.
//!
//! Supporting modules:
//!
//! - **crypto** — key loading and the pinned OAEP/PSS parameters.
//! - **secret** — the validated [`Secret`] type and its base-32 form.
//! - **store** — the persisted-secret abstraction with an atomic file backend.
//! - **authenticator** — store + clock + engines, the facade services use.
//! - **config** — constants and the verification policy.
//! - **error** — the closed error taxonomy.
//!
//! ## Design Philosophy
//!
//! 1. Padding, digests and endianness are pinned in one place each. A
//!    mismatch there doesn't crash, it just silently stops interoperating.
//! 2. Secrets are validated at every boundary and never logged.
//! 3. Pure functions at the core; I/O only at the edges.

pub mod authenticator;
pub mod config;
pub mod crypto;
pub mod error;
pub mod proof;
pub mod secret;
pub mod store;
pub mod totp;
pub mod unseal;

pub use authenticator::{Authenticator, Clock, FixedClock, GeneratedCode, Provisioner, SystemClock};
pub use config::TotpPolicy;
pub use crypto::{PrivateKey, PublicKey};
pub use error::{KeywardError, Result};
pub use proof::{attest, open, seal, CommitId, Proof, ProofArtifact, SignedAttestation};
pub use secret::{EncodedSecret, Secret};
pub use store::{FileSecretStore, MemorySecretStore, SecretStore};
pub use totp::{OtpCode, TimeStep, TotpEngine};
pub use unseal::{seal_secret, unseal, SealedBlob};
