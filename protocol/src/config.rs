//! # Protocol Configuration & Constants
//!
//! Every magic number in Keyward lives here. The TOTP parameters are fixed by
//! RFC 6238 interop (authenticator apps assume 30s / 6 digits / SHA-1), the
//! RSA overheads fall out of the OAEP and PSS encodings with SHA-256. If you
//! change one of these, every code already printed on someone's phone stops
//! matching. Choose accordingly.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Secret Format
// ---------------------------------------------------------------------------

/// Length of a provisioned secret in hex characters.
pub const SECRET_HEX_LENGTH: usize = 64;

/// Entropy carried by a secret, in bytes. Two hex chars per byte.
pub const SECRET_BYTE_LENGTH: usize = SECRET_HEX_LENGTH / 2;

/// Length of a git commit identifier (SHA-1, hex).
pub const COMMIT_ID_LENGTH: usize = 40;

// ---------------------------------------------------------------------------
// TOTP Parameters
// ---------------------------------------------------------------------------

/// Length of one TOTP time bucket.
pub const TOTP_STEP_SECONDS: u64 = 30;

/// Number of decimal digits in a generated code.
pub const TOTP_DIGITS: u32 = 6;

/// Default number of adjacent buckets accepted on either side of "now".
/// One bucket each way means +/-30 seconds of client clock skew.
pub const DEFAULT_VERIFY_WINDOW: u32 = 1;

// ---------------------------------------------------------------------------
// RSA Parameters
// ---------------------------------------------------------------------------

/// Smallest modulus we agree to load. Anything below this is either a test
/// key that escaped or a museum piece.
pub const MIN_RSA_MODULUS_BITS: usize = 2048;

/// Default modulus size for freshly generated key pairs.
pub const DEFAULT_KEY_BITS: usize = 4096;

/// SHA-256 digest length in bytes.
pub const SHA256_OUTPUT_LENGTH: usize = 32;

/// OAEP encoding overhead with SHA-256: `2 * hLen + 2`.
pub const OAEP_SHA256_OVERHEAD: usize = 2 * SHA256_OUTPUT_LENGTH + 2;

/// PSS encoding overhead with SHA-256: `hLen + 2`.
pub const PSS_SHA256_OVERHEAD: usize = SHA256_OUTPUT_LENGTH + 2;

/// Largest plaintext RSA-OAEP/SHA-256 can carry under a modulus of the given
/// byte size. Returns 0 for moduli too small to carry anything at all.
pub fn oaep_max_plaintext_len(modulus_bytes: usize) -> usize {
    modulus_bytes.saturating_sub(OAEP_SHA256_OVERHEAD)
}

/// Maximum PSS salt length for a modulus of `modulus_bits` bits.
///
/// The encoded message is `emLen = ceil((modBits - 1) / 8)` bytes, and the
/// salt gets whatever is left after the hash and the two framing bytes.
pub fn pss_max_salt_len(modulus_bits: usize) -> usize {
    let em_len = (modulus_bits.saturating_sub(1) + 7) / 8;
    em_len.saturating_sub(PSS_SHA256_OVERHEAD)
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Verification policy for the OTP engine.
///
/// The tolerance window is a deployment decision, not a protocol one, so it
/// travels as configuration instead of being baked into the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotpPolicy {
    /// Buckets accepted on each side of the current one.
    pub window: u32,
}

impl TotpPolicy {
    pub fn with_window(window: u32) -> Self {
        Self { window }
    }
}

impl Default for TotpPolicy {
    fn default() -> Self {
        Self {
            window: DEFAULT_VERIFY_WINDOW,
        }
    }
}
