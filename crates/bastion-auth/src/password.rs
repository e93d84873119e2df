//! Checking a presented password against a stored Argon2id PHC string.

use argon2::password_hash::{Error as HashError, PasswordHash};
use argon2::{Argon2, PasswordVerifier};

use crate::error::AuthError;

/// `Ok(false)` for a wrong password; an error only when the stored hash
/// cannot be read. `pepper` must be the one the hash was created with.
pub fn verify_password(
    password: &str,
    hash: &str,
    pepper: Option<&str>,
) -> Result<bool, AuthError> {
    let stored = PasswordHash::new(hash)
        .map_err(|e| AuthError::Crypto(format!("stored password hash unreadable: {e}")))?;
    let secret = [pepper.unwrap_or_default(), password].concat();

    // Cost parameters come from the PHC string, not from this instance.
    match Argon2::default().verify_password(secret.as_bytes(), &stored) {
        Ok(()) => Ok(true),
        Err(HashError::Password) => Ok(false),
        Err(e) => Err(AuthError::Crypto(format!("password check failed: {e}"))),
    }
}
