//! Text-safe transport encoding.
//!
//! Ciphertexts cross process boundaries as standard, padded base64 on a
//! single line. On the way in we are lenient about ASCII whitespace (PEM-style
//! line wrapping, trailing newlines from `echo`), strict about everything
//! else.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{KeywardError, Result};

/// Encode bytes as single-line standard base64.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64, ignoring embedded ASCII whitespace.
pub fn decode(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(KeywardError::format("empty base64 payload"));
    }
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| KeywardError::format(format!("invalid base64: {e}")))
}
