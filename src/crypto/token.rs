use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};

use crate::error::{AppError, Result};

/// Fills `n` bytes from the operating system CSPRNG.
///
/// The only failure is the entropy source itself, which is not retryable.
pub fn random_bytes(n: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; n];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AppError::Entropy(e.to_string()))?;
    Ok(bytes)
}

/// `n` random bytes, base64url-encoded without padding.
pub fn random_token(n: usize) -> Result<String> {
    random_bytes(n).map(|bytes| encode(&bytes))
}

/// Encodes opaque bytes for a cookie or URL.
pub fn encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Reverses [`encode`]; `None` on anything that is not unpadded base64url.
pub fn decode(value: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(value).ok()
}
