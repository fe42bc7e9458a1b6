//! Local password hashing with argon2 PHC strings.
use crate::errors::{AuthError, AuthResult};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;
use std::sync::OnceLock;
use tracing::{error, warn};

/// Hash `plain` into a PHC string suitable for [`crate::AuthProvider::Local`].
pub fn hash_password(plain: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| {
            error!(error = %err, "password hashing failed");
            AuthError::Config(format!("password hashing failed: {err}"))
        })
}

/// Verify `plain` against a stored PHC string.
///
/// An unparseable hash never verifies.
pub fn verify_password(plain: &str, phc: &str) -> bool {
    let parsed = match PasswordHash::new(phc) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(error = %err, "stored password hash is not a valid PHC string");
            return false;
        }
    };
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok()
}

/// Spend the same work as a real verification when there is nothing to verify.
///
/// Keeps the response time of a login for an unknown user in line with a wrong
/// password for a known one.
pub(crate) fn burn_verification(plain: &str) {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    let dummy = DUMMY.get_or_init(|| hash_password("bastion-dummy-password").ok());
    if let Some(phc) = dummy {
        let _ = verify_password(plain, phc);
    }
}
