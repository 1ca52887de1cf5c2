//! Password hashing with Argon2id.
//!
//! Hashes use the PHC string format, so the salt and cost parameters travel
//! with the hash and can be tuned without invalidating stored credentials.
//! Plaintext passwords are never stored or logged; the only operations are
//! hash-on-write and verify-on-login.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, ParamsBuilder, Version,
};
use rand::Rng;

/// Errors from hashing or verifying passwords.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(String),
    #[error("stored password hash is malformed: {0}")]
    InvalidHash(String),
    #[error("failed to verify password: {0}")]
    Verify(String),
}

// OWASP-recommended interactive login parameters: 64 MiB, 3 iterations,
// 4 lanes, 32-byte output.
fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = ParamsBuilder::new()
        .m_cost(65536)
        .t_cost(3)
        .p_cost(4)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::Hash(e.to_string()))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a plaintext password with a fresh random salt.
///
/// # Example
///
/// ```
/// use portcullis_core::auth::password;
///
/// let hash = password::hash_password("hunter2hunter2").unwrap();
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::Hash(e.to_string()))?;

    Ok(hash.to_string())
}

/// Check a plaintext password against a stored hash.
///
/// Returns `Ok(false)` for a wrong password; `Err` is reserved for hashes
/// that cannot be parsed or backend failures, which callers must treat as
/// internal errors rather than authentication failures.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

    match hasher()?.verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::Verify(e.to_string())),
    }
}

const TEMP_PASSWORD_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const TEMP_PASSWORD_LEN: usize = 24;

/// Generate a random temporary password for accounts created without one.
///
/// The value is handed to the store only as a hash; it is never returned in
/// a response or written to a log, so the account is unusable until the
/// password is reset out of band.
pub fn generate_temporary() -> String {
    let mut rng = rand::thread_rng();
    (0..TEMP_PASSWORD_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..TEMP_PASSWORD_CHARSET.len());
            TEMP_PASSWORD_CHARSET[idx] as char
        })
        .collect()
}
