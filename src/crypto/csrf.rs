use subtle::ConstantTimeEq;

use crate::crypto::token;
use crate::error::Result;

/// The size of the CSRF token in bytes.
const CSRF_TOKEN_SIZE: usize = 32;

/// Generates a new random CSRF token.
///
/// # Returns
///
/// A URL-safe base64-encoded CSRF token.
pub fn generate_csrf_token() -> Result<String> {
    token::random_token(CSRF_TOKEN_SIZE)
}

/// Compares the submitted token with the cookie copy without leaking where
/// they differ.
pub fn tokens_match(cookie: &str, submitted: &str) -> bool {
    !cookie.is_empty() && bool::from(cookie.as_bytes().ct_eq(submitted.as_bytes()))
}
