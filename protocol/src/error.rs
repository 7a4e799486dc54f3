//! Error types for Keyward.
//!
//! Every fallible operation in the library returns a [`KeywardError`]. The set
//! is closed on purpose: callers match on the category ("bad data", "crypto
//! failed", "nothing provisioned yet", "you forgot a field") and never have
//! to grep strings.
//!
//! None of the messages carry decrypted plaintext or key bytes. The crypto
//! variant holds the scheme-level description only ("decryption error",
//! "message too long"), which is all an operator needs.

use thiserror::Error;

/// Errors surfaced by the provisioning and verification pipeline.
#[derive(Debug, Error)]
pub enum KeywardError {
    /// A decoded or derived value violates a structural invariant: wrong
    /// length, wrong alphabet, wrong encoding.
    #[error("format error: {0}")]
    Format(String),

    /// The cryptographic operation itself failed: bad key, corrupted
    /// ciphertext, message too large for the padding scheme.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// An OTP operation was requested before any secret was persisted.
    #[error("secret has not been provisioned")]
    NotProvisioned,

    /// A required request field was absent or empty.
    #[error("missing required input: {0}")]
    MissingInput(&'static str),

    /// The secret store could not be read or written.
    #[error("storage error: {0}")]
    Storage(String),
}

impl KeywardError {
    /// Stable machine-readable category, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            KeywardError::Format(_) => "format",
            KeywardError::Crypto(_) => "crypto",
            KeywardError::NotProvisioned => "not_provisioned",
            KeywardError::MissingInput(_) => "missing_input",
            KeywardError::Storage(_) => "storage",
        }
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        KeywardError::Format(msg.into())
    }

    pub(crate) fn crypto(msg: impl Into<String>) -> Self {
        KeywardError::Crypto(msg.into())
    }
}

impl From<std::io::Error> for KeywardError {
    fn from(err: std::io::Error) -> Self {
        KeywardError::Storage(err.to_string())
    }
}

impl From<rsa::Error> for KeywardError {
    fn from(err: rsa::Error) -> Self {
        // rsa::Error's Display is scheme-level ("decryption error", "message
        // too long") and never echoes key or plaintext bytes.
        KeywardError::Crypto(err.to_string())
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, KeywardError>;
