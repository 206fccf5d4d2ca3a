//! Password hashing

/// Cost factor for bcrypt hashing (12 is recommended for production)
const BCRYPT_COST: u32 = if cfg!(test) { 4 } else { 12 };

#[derive(Debug, thiserror::Error)]
#[error("Password hashing failed: {0}")]
pub struct PasswordError(#[from] bcrypt::BcryptError);

/// Hash a password using bcrypt with automatic salt generation
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    Ok(bcrypt::hash(password, BCRYPT_COST)?)
}

/// Verify a password against a bcrypt hash
///
/// A malformed stored hash never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match bcrypt::verify(password, hash) {
        Ok(valid) => valid,
        Err(e) => {
            tracing::warn!("Stored password hash is unusable: {}", e);
            false
        }
    }
}
