//! Per-request security context.
//!
//! # Purpose
//! Turns the credentials a request carries (bearer cookie, HTTP method, CSRF
//! header) into a [`SecurityContext`]: either an authenticated identity or the
//! reason authentication failed.
//!
//! # Steps
//! 1. No cookie: `NoToken`.
//! 2. Token rejected: `TokenExpired`, `BadSignature` or `MalformedToken`.
//! 3. CSRF check, unless disabled. By default every method except `GET` is
//!    checked.
//! 4. Claims attached.
//! 5. For [`AuthLevel::User`] the principal named by `usr` is resolved through
//!    the [`PrincipalStore`].
//!
//! The first failing step wins and the rest are skipped. A context holding a
//! failure never carries claims or a principal.
use crate::claims::Claims;
use crate::csrf;
use crate::errors::{AuthError, AuthResult};
use crate::principal::Principal;
use crate::store::PrincipalStore;
use crate::token::TokenCodec;
use std::sync::Arc;
use tracing::{debug, warn};

/// How much identity an operation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthLevel {
    /// A valid token is enough.
    Basic,
    /// The token's principal must also exist in the store.
    User,
}

/// Credentials extracted from an incoming request by the transport layer.
#[derive(Debug, Clone, Copy)]
pub struct RequestCredentials<'a> {
    pub cookie: Option<&'a str>,
    pub method: &'a str,
    pub csrf_header: Option<&'a str>,
}

impl<'a> RequestCredentials<'a> {
    pub fn new(method: &'a str) -> Self {
        Self {
            cookie: None,
            method,
            csrf_header: None,
        }
    }

    pub fn with_cookie(mut self, cookie: &'a str) -> Self {
        self.cookie = Some(cookie);
        self
    }

    pub fn with_csrf(mut self, value: &'a str) -> Self {
        self.csrf_header = Some(value);
        self
    }

    fn csrf_applies(&self, validate_csrf: Option<bool>) -> bool {
        validate_csrf.unwrap_or_else(|| !self.method.eq_ignore_ascii_case("GET"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Anonymous,
    Claims(Claims),
    Principal { claims: Claims, principal: Principal },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecurityContext {
    auth: AuthState,
    failure: Option<AuthError>,
}

impl Default for SecurityContext {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl SecurityContext {
    pub fn anonymous() -> Self {
        Self {
            auth: AuthState::Anonymous,
            failure: None,
        }
    }

    pub fn failed(error: AuthError) -> Self {
        Self {
            auth: AuthState::Anonymous,
            failure: Some(error),
        }
    }

    pub fn from_claims(claims: Claims) -> Self {
        Self {
            auth: AuthState::Claims(claims),
            failure: None,
        }
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    pub fn failure(&self) -> Option<&AuthError> {
        self.failure.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self.auth, AuthState::Anonymous)
    }

    pub fn claims(&self) -> Option<&Claims> {
        match &self.auth {
            AuthState::Anonymous => None,
            AuthState::Claims(claims) | AuthState::Principal { claims, .. } => Some(claims),
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        match &self.auth {
            AuthState::Principal { principal, .. } => Some(principal),
            _ => None,
        }
    }

    /// Record a failure, dropping whatever identity was attached.
    pub fn fail(&mut self, error: AuthError) {
        self.auth = AuthState::Anonymous;
        self.failure = Some(error);
    }

    /// Resolve the principal named by the claims, once.
    ///
    /// An already resolved principal is returned as is. A lookup failure is
    /// recorded on the context as well as returned.
    pub async fn resolve_principal(
        &mut self,
        store: &dyn PrincipalStore,
    ) -> AuthResult<&Principal> {
        let pending = match &self.auth {
            AuthState::Anonymous => {
                return Err(self.failure.clone().unwrap_or(AuthError::NoToken));
            }
            AuthState::Claims(claims) => Some(claims.clone()),
            AuthState::Principal { .. } => None,
        };
        if let Some(claims) = pending {
            match lookup_principal(store, &claims.usr).await {
                Ok(principal) => self.auth = AuthState::Principal { claims, principal },
                Err(err) => {
                    self.fail(err.clone());
                    return Err(err);
                }
            }
        }
        match &self.auth {
            AuthState::Principal { principal, .. } => Ok(principal),
            _ => Err(self.failure.clone().unwrap_or(AuthError::NoToken)),
        }
    }
}

/// Find `username`, normalizing store errors into client-safe kinds.
pub(crate) async fn lookup_principal(
    store: &dyn PrincipalStore,
    username: &str,
) -> AuthResult<Principal> {
    match store.find_principal(username).await {
        Ok(Some(principal)) => Ok(principal),
        Ok(None) => {
            debug!(usr = %username, "principal not found");
            Err(AuthError::PrincipalNotFound)
        }
        Err(err) => {
            warn!(usr = %username, error = %err, "principal lookup failed");
            Err(AuthError::PrincipalLookupFailed)
        }
    }
}

/// Builds security contexts from request credentials.
#[derive(Clone)]
pub struct ContextBuilder {
    codec: TokenCodec,
    store: Arc<dyn PrincipalStore>,
    bypass: Option<Claims>,
}

impl std::fmt::Debug for ContextBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextBuilder")
            .field("codec", &self.codec)
            .field("bypass", &self.bypass)
            .finish_non_exhaustive()
    }
}

impl ContextBuilder {
    pub fn new(codec: TokenCodec, store: Arc<dyn PrincipalStore>) -> Self {
        Self {
            codec,
            store,
            bypass: None,
        }
    }

    /// Skip token and CSRF checks and use `claims` for every request.
    ///
    /// Only for trusted deployments that explicitly disable authentication.
    pub fn with_bypass(mut self, claims: Claims) -> Self {
        self.bypass = Some(claims);
        self
    }

    pub fn bypass_active(&self) -> bool {
        self.bypass.is_some()
    }

    pub async fn build(
        &self,
        request: &RequestCredentials<'_>,
        validate_csrf: Option<bool>,
        level: AuthLevel,
    ) -> SecurityContext {
        let claims = match &self.bypass {
            Some(claims) => claims.clone(),
            None => match self.authenticate(request, validate_csrf) {
                Ok(claims) => claims,
                Err(err) => {
                    debug!(error = %err, method = %request.method, "request not authenticated");
                    return SecurityContext::failed(err);
                }
            },
        };
        let mut context = SecurityContext::from_claims(claims);
        if level == AuthLevel::User {
            // A failed lookup is recorded on the context itself.
            let _ = context.resolve_principal(self.store.as_ref()).await;
        }
        context
    }

    fn authenticate(
        &self,
        request: &RequestCredentials<'_>,
        validate_csrf: Option<bool>,
    ) -> AuthResult<Claims> {
        let token = request.cookie.ok_or(AuthError::NoToken)?;
        let claims = self.codec.validate(token)?;
        if request.csrf_applies(validate_csrf) && !csrf::check(token, request.csrf_header) {
            return Err(AuthError::MissingOrInvalidCsrf);
        }
        Ok(claims)
    }
}
