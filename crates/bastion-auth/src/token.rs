use crate::claims::Claims;
use crate::errors::{AuthError, AuthResult, TokenError};
use crate::keys::SharedKeys;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Header, Validation};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error};

/// Signs and verifies RS256 bearer tokens with the shared keypair.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    keys: SharedKeys,
    validity: Duration,
    leeway: u64,
}

impl TokenCodec {
    pub fn new(keys: SharedKeys, validity: Duration, leeway: u64) -> Self {
        Self {
            keys,
            validity,
            leeway,
        }
    }

    pub fn keys(&self) -> &SharedKeys {
        &self.keys
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Sign `claims`, adding `exp = now + validity` when the caller left it out.
    pub fn issue(&self, mut claims: Claims) -> AuthResult<String> {
        if claims.exp.is_none() {
            let exp = i64::try_from(self.validity.as_secs())
                .ok()
                .and_then(|validity| now_epoch_seconds().checked_add(validity))
                .ok_or_else(|| {
                    error!(
                        validity_secs = self.validity.as_secs(),
                        usr = %claims.usr,
                        "token validity window out of range"
                    );
                    AuthError::TokenGenerationFailed
                })?;
            claims.exp = Some(exp);
        }
        let keypair = self.keys.current();
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, keypair.encoding_key())
            .map_err(|err| {
                error!(error = %err, usr = %claims.usr, "token signing failed");
                AuthError::TokenGenerationFailed
            })
    }

    /// Claims of a validated token, prepared for re-issue with a fresh window.
    pub fn refresh_claims(claims: Claims) -> Claims {
        claims.without_expiry()
    }

    /// Verify signature and expiry and decode the claims.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let keypair = self.keys.current();
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = self.leeway;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);
        match jsonwebtoken::decode::<Claims>(token, keypair.decoding_key(), &validation) {
            Ok(data) => Ok(data.claims),
            Err(err) => {
                debug!(error = %err, "token rejected");
                Err(classify(err.kind()))
            }
        }
    }
}

fn classify(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::BadSignature,
        _ => TokenError::Malformed,
    }
}

pub(crate) fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs() as i64
}
