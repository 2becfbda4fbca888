//! Password hashing for admin profile documents.
//!
//! Uses bcrypt with a fixed cost of 10, the same cost the platform's login
//! endpoint was built against. Every call to [`hash_password`] draws a fresh
//! random salt, so two hashes of the same plaintext never compare equal.

use secrecy::{ExposeSecret, SecretString};

/// bcrypt work factor.
pub const BCRYPT_COST: u32 = 10;

/// Hash a plaintext password with a fresh salt.
///
/// # Errors
///
/// Returns `bcrypt::BcryptError` if the system random source fails.
pub fn hash_password(password: &SecretString) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password.expose_secret(), BCRYPT_COST)
}

/// Check a plaintext password against a stored bcrypt hash.
///
/// # Errors
///
/// Returns `bcrypt::BcryptError` if the stored hash is malformed.
pub fn verify_password(password: &SecretString, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    bcrypt::verify(password.expose_secret(), hash)
}
