//! # Cryptographic Primitives for Keyward
//!
//! Every asymmetric operation in the crate flows through here:
//!
//! - **RSA-OAEP** (SHA-256, MGF1-SHA-256, no label) for sealing secrets and proofs.
//! - **RSA-PSS** (SHA-256, MGF1-SHA-256, max salt) for attestations.
//! - **Base64** as the text-safe transport layer for ciphertexts.
//!
//! The one-time-password HMAC lives in [`crate::totp`]; it's symmetric and
//! has nothing to do with the key pairs here.
//!
//! ## A note on "rolling your own crypto"
//!
//! We don't. The padding schemes come from the `rsa` crate; this module pins
//! their parameters and gives them errors that match the rest of the crate.

pub mod keys;
pub mod oaep;
pub mod pss;
pub mod transport;

pub use keys::{PrivateKey, PublicKey};
