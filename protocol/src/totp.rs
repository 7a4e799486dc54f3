//! # OTP Engine
//!
//! Time-based one-time passwords per RFC 6238, on top of HOTP (RFC 4226):
//!
//! ```text
//! counter = floor(unix_seconds / 30)
//! mac     = HMAC-SHA1(secret_bytes, counter as 8-byte big-endian)
//! offset  = mac[19] & 0x0f
//! binary  = mac[offset..offset+4] as big-endian u32, top bit cleared
//! code    = binary mod 10^6, left-padded with zeros
//! ```
//!
//! Every step of that is a place to be silently wrong (little-endian
//! counter, forgetting the top bit, dropping leading zeros), and every one
//! of those bugs still produces plausible-looking six-digit numbers. The
//! tests pin the RFC 4226 vectors for exactly that reason.
//!
//! ## Verification window
//!
//! [`verify`] recomputes the code independently for every bucket in
//! `current - window ..= current + window` and compares each in constant
//! time. It never compares against a cached "current" code: a client whose
//! clock is `window * 30` seconds off must still get in. All buckets are
//! always checked, match or not, so the timing doesn't reveal which one hit.

use std::fmt;

use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;

use crate::config::{TotpPolicy, TOTP_DIGITS, TOTP_STEP_SECONDS};
use crate::error::Result;
use crate::secret::{EncodedSecret, Secret};

type HmacSha1 = Hmac<Sha1>;

/// Seconds since the Unix epoch, UTC.
pub type UnixTime = u64;

// ---------------------------------------------------------------------------
// Time Buckets
// ---------------------------------------------------------------------------

/// The HOTP counter for a moment in time: `floor(t / 30)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeStep(u64);

impl TimeStep {
    pub fn at(now: UnixTime) -> Self {
        Self(now / TOTP_STEP_SECONDS)
    }

    pub fn from_counter(counter: u64) -> Self {
        Self(counter)
    }

    pub fn counter(self) -> u64 {
        self.0
    }

    /// The bucket `delta` steps away, or `None` below zero / past `u64::MAX`.
    pub fn offset(self, delta: i64) -> Option<Self> {
        self.0.checked_add_signed(delta).map(Self)
    }

    /// Whole seconds left in the bucket containing `now`, after the current
    /// second. Always in `0..30`.
    pub fn remaining_seconds(now: UnixTime) -> u64 {
        TOTP_STEP_SECONDS - 1 - now % TOTP_STEP_SECONDS
    }
}

// ---------------------------------------------------------------------------
// Codes
// ---------------------------------------------------------------------------

/// A zero-padded six-digit code.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OtpCode(String);

impl OtpCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode(******)")
    }
}

/// RFC 4226 HOTP: HMAC-SHA1 over the big-endian counter, dynamic
/// truncation, `digits` decimal places.
pub fn hotp(key: &[u8], counter: u64, digits: u32) -> String {
    debug_assert!((1..=9).contains(&digits), "HOTP digits out of range: {digits}");

    let mut mac = HmacSha1::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset],
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]) & 0x7fff_ffff;

    let code = u64::from(binary) % 10u64.pow(digits);
    format!("{:0width$}", code, width = digits as usize)
}

/// The base-32 form authenticator apps expect. Never fails for a [`Secret`].
pub fn to_encoded_secret(secret: &Secret) -> EncodedSecret {
    secret.to_encoded()
}

/// Code for the bucket containing `now`.
pub fn generate(secret: &Secret, now: UnixTime) -> OtpCode {
    code_at(&secret.to_bytes()[..], TimeStep::at(now))
}

/// Code for an externally supplied base-32 secret.
///
/// For a [`Secret`], `generate_encoded(&to_encoded_secret(s), t)` and
/// `generate(s, t)` agree: both key the HMAC with the same 32 bytes.
pub fn generate_encoded(encoded: &EncodedSecret, now: UnixTime) -> Result<OtpCode> {
    let key = encoded.to_bytes()?;
    Ok(code_at(&key, TimeStep::at(now)))
}

/// Check `submitted` against every bucket within `window` of `now`.
///
/// Returns `false`, never an error, for codes that aren't exactly six ASCII
/// digits.
pub fn verify(secret: &Secret, submitted: &str, now: UnixTime, window: u32) -> bool {
    if !is_well_formed(submitted) {
        return false;
    }

    let key = secret.to_bytes();
    let current = TimeStep::at(now);
    let window = i64::from(window);

    let mut matched = false;
    for delta in -window..=window {
        if let Some(step) = current.offset(delta) {
            let candidate = code_at(&key[..], step);
            matched |= constant_time_eq(candidate.as_str().as_bytes(), submitted.as_bytes());
        }
    }
    matched
}

fn code_at(key: &[u8], step: TimeStep) -> OtpCode {
    OtpCode(hotp(key, step.counter(), TOTP_DIGITS))
}

fn is_well_formed(code: &str) -> bool {
    code.len() == TOTP_DIGITS as usize && code.bytes().all(|b| b.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// OTP generation and verification under a configured [`TotpPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TotpEngine {
    policy: TotpPolicy,
}

impl TotpEngine {
    pub fn new(policy: TotpPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> TotpPolicy {
        self.policy
    }

    pub fn generate(&self, secret: &Secret, now: UnixTime) -> OtpCode {
        generate(secret, now)
    }

    pub fn verify(&self, secret: &Secret, submitted: &str, now: UnixTime) -> bool {
        verify(secret, submitted, now, self.policy.window)
    }
}
