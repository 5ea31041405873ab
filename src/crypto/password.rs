//! Password hashing and verification with Argon2id.
//!
//! Hashes are self-describing strings:
//! `$argon2id$v=19$m=<memory>,t=<iterations>,p=<parallelism>$<salt>$<hash>`
//! with salt and hash in unpadded standard base64, so verification reads
//! every parameter back from the string itself.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::crypto::token;
use crate::error::{AppError, Result};

/// The algorithm identifier written into every hash.
pub const ALGORITHM: &str = "argon2id";
/// The memory cost for Argon2 in KiB (64 MiB).
pub const ARGON2_MEMORY_KIB: u32 = 64 * 1024;
/// The number of iterations for Argon2.
pub const ARGON2_ITERATIONS: u32 = 3;
/// The parallelism factor for Argon2.
pub const ARGON2_PARALLELISM: u32 = 2;
/// The salt length in bytes.
pub const SALT_LENGTH: usize = 16;
/// The derived key length in bytes.
pub const KEY_LENGTH: usize = 32;

/// Hashes and verifies passwords.
#[derive(Clone, Debug)]
pub struct PasswordHasher {
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            memory_kib: ARGON2_MEMORY_KIB,
            iterations: ARGON2_ITERATIONS,
            parallelism: ARGON2_PARALLELISM,
        }
    }
}

/// The pieces of a parsed hash string.
#[derive(Debug)]
struct EncodedHash {
    version: u32,
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
    salt: Vec<u8>,
    key: Vec<u8>,
}

impl PasswordHasher {
    /// Uses caller-chosen costs instead of the production defaults.
    ///
    /// Verification always honours the costs stored in the hash, so hashes
    /// produced here verify with any `PasswordHasher`.
    pub fn with_costs(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism,
        }
    }

    /// Hashes a password with a fresh random salt.
    ///
    /// # Arguments
    ///
    /// * `password` - The password to hash.
    ///
    /// # Returns
    ///
    /// A `Result` containing the encoded hash string.
    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = token::random_bytes(SALT_LENGTH)?;
        let key = derive(
            password,
            &salt,
            self.memory_kib,
            self.iterations,
            self.parallelism,
            KEY_LENGTH,
        )?;

        let encoded = format!(
            "${}$v={}$m={},t={},p={}${}${}",
            ALGORITHM,
            Version::V0x13 as u32,
            self.memory_kib,
            self.iterations,
            self.parallelism,
            STANDARD_NO_PAD.encode(&salt),
            STANDARD_NO_PAD.encode(key.as_slice()),
        );

        tracing::debug!("Password hashed successfully with Argon2");
        Ok(encoded)
    }

    /// Verifies a password against an encoded hash.
    ///
    /// # Arguments
    ///
    /// * `password` - The password to verify.
    /// * `encoded` - The hash produced by [`PasswordHasher::hash`].
    ///
    /// # Returns
    ///
    /// `Ok(true)` on a match, `Ok(false)` on a mismatch, and
    /// `AppError::MalformedHash` / `AppError::Hashing` when the stored hash
    /// cannot be used.
    pub fn verify(&self, password: &str, encoded: &str) -> Result<bool> {
        let parsed = parse(encoded)?;
        if parsed.version != Version::V0x13 as u32 {
            return Err(AppError::MalformedHash(format!(
                "unsupported version {}",
                parsed.version
            )));
        }

        let computed = derive(
            password,
            &parsed.salt,
            parsed.memory_kib,
            parsed.iterations,
            parsed.parallelism,
            parsed.key.len(),
        )?;

        let matched: bool = computed.as_slice().ct_eq(&parsed.key).into();
        tracing::debug!("Password verification completed");
        Ok(matched)
    }
}

fn derive(
    password: &str,
    salt: &[u8],
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
    key_length: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    let params = Params::new(memory_kib, iterations, parallelism, Some(key_length))
        .map_err(|e| AppError::Hashing(format!("Argon2 params: {}", e)))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new(vec![0u8; key_length]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| AppError::Hashing(format!("Argon2 hash error: {}", e)))?;
    Ok(key)
}

fn parse(encoded: &str) -> Result<EncodedHash> {
    let malformed = |what: &str| AppError::MalformedHash(what.to_string());

    let parts: Vec<&str> = encoded.split('$').collect();
    if parts.len() != 6 || !parts[0].is_empty() {
        return Err(malformed("invalid hash format"));
    }
    if parts[1] != ALGORITHM {
        return Err(malformed("unsupported algorithm"));
    }

    let version = parts[2]
        .strip_prefix("v=")
        .and_then(|v| v.parse::<u32>().ok())
        .ok_or_else(|| malformed("invalid version field"))?;

    let (memory_kib, iterations, parallelism) =
        parse_params(parts[3]).ok_or_else(|| malformed("invalid parameter field"))?;

    let salt = STANDARD_NO_PAD
        .decode(parts[4])
        .map_err(|_| malformed("invalid salt encoding"))?;
    let key = STANDARD_NO_PAD
        .decode(parts[5])
        .map_err(|_| malformed("invalid hash encoding"))?;
    if key.is_empty() {
        return Err(malformed("empty derived key"));
    }

    Ok(EncodedHash {
        version,
        memory_kib,
        iterations,
        parallelism,
        salt,
        key,
    })
}

/// Parses `m=<u32>,t=<u32>,p=<u32>` in exactly that order.
fn parse_params(field: &str) -> Option<(u32, u32, u32)> {
    let mut values = field.split(',');
    let mut next = |prefix: &str| -> Option<u32> { values.next()?.strip_prefix(prefix)?.parse().ok() };

    let memory = next("m=")?;
    let iterations = next("t=")?;
    let parallelism = next("p=")?;
    if values.next().is_some() {
        return None;
    }
    Some((memory, iterations, parallelism))
}
