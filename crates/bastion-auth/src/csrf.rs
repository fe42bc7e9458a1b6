//! CSRF binding derived from the bearer token itself.
//!
//! The binding value is `base64(sha3_256(token))`. A client that can read its
//! own token can reproduce it; a cross-site request that only gets the cookie
//! attached by the browser cannot. No server-side state is kept.
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha3::{Digest, Sha3_256};
use subtle::ConstantTimeEq;

/// Compute the CSRF value a client must echo back for `token`.
pub fn derive(token: &str) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(token.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Check a client supplied CSRF value against `token`.
///
/// A missing value never matches. The comparison runs in constant time.
pub fn check(token: &str, supplied: Option<&str>) -> bool {
    let Some(supplied) = supplied else {
        return false;
    };
    let expected = derive(token);
    expected.as_bytes().ct_eq(supplied.as_bytes()).into()
}
