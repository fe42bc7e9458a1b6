use thiserror::Error;

/// Why a bearer token was rejected by [`crate::TokenCodec::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token signature")]
    BadSignature,
    #[error("invalid token")]
    Malformed,
}

/// Every way authentication or authorization can fail.
///
/// Display strings are safe to hand back to clients: they never carry
/// collaborator detail (database errors, directory internals). The one
/// exception is [`AuthError::ExternalAuthFailed`], whose message comes from the
/// directory service on purpose so users see why their directory login failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("No token provided")]
    NoToken,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Invalid token signature")]
    BadSignature,
    #[error("invalid token")]
    MalformedToken,
    #[error("Invalid or missing CSRF token")]
    MissingOrInvalidCsrf,
    #[error("Invalid user")]
    PrincipalNotFound,
    #[error("Failed to get user information from database")]
    PrincipalLookupFailed,
    #[error("{}", .0.as_deref().unwrap_or("Insufficient permissions"))]
    InsufficientPermissions(Option<String>),
    #[error("Account deactivated")]
    AccountDeactivated,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Access denied")]
    LoginDenied,
    #[error("{0}")]
    ExternalAuthFailed(String),
    #[error("Token generation failed")]
    TokenGenerationFailed,
    #[error("invalid security configuration: {0}")]
    Config(String),
}

impl AuthError {
    /// The request lacks a usable identity (maps to HTTP 401).
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            AuthError::NoToken
                | AuthError::TokenExpired
                | AuthError::BadSignature
                | AuthError::MalformedToken
                | AuthError::MissingOrInvalidCsrf
                | AuthError::PrincipalNotFound
                | AuthError::PrincipalLookupFailed
                | AuthError::InvalidCredentials
                | AuthError::ExternalAuthFailed(_)
        )
    }

    /// The identity is known but not allowed to do this (maps to HTTP 403).
    pub fn is_forbidden(&self) -> bool {
        matches!(
            self,
            AuthError::InsufficientPermissions(_)
                | AuthError::AccountDeactivated
                | AuthError::LoginDenied
        )
    }
}

impl From<TokenError> for AuthError {
    fn from(value: TokenError) -> Self {
        match value {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::BadSignature => AuthError::BadSignature,
            TokenError::Malformed => AuthError::MalformedToken,
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
