//! Engine facade wiring configuration, keys and collaborators together.
//!
//! # Purpose
//! Hosts build one [`AuthEngine`] at startup and share it (`Arc` or clone)
//! across request handlers. Every handler then needs only three calls:
//! [`AuthEngine::context`] to authenticate, [`AuthEngine::check_permissions`]
//! to authorize, and [`AuthEngine::login`]/[`AuthEngine::refresh`] for the
//! session endpoints.
//!
//! # Authentication bypass
//! With `require_auth = false` every request is treated as the configured
//! `default_context` principal. Construction refuses this without a default
//! context and logs a warning whenever it is active.
use crate::authorize::Authorizer;
use crate::capability::{Capability, DomainAccess};
use crate::claims::Claims;
use crate::config::SecurityConfig;
use crate::context::{AuthLevel, ContextBuilder, RequestCredentials, SecurityContext};
use crate::csrf;
use crate::errors::{AuthError, AuthResult, TokenError};
use crate::keys::{KeyStore, Keypair, SharedKeys};
use crate::login::CredentialVerifier;
use crate::store::{DirectoryAuthenticator, PrincipalStore};
use crate::token::TokenCodec;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct AuthEngine {
    config: SecurityConfig,
    key_store: KeyStore,
    codec: TokenCodec,
    contexts: ContextBuilder,
    authorizer: Authorizer,
    verifier: CredentialVerifier,
}

impl AuthEngine {
    /// Validate `config`, load or generate the signing keys and wire the engine.
    pub fn new(
        config: SecurityConfig,
        store: Arc<dyn PrincipalStore>,
        directory: Option<Arc<dyn DirectoryAuthenticator>>,
    ) -> AuthResult<Self> {
        validate_config(&config)?;
        let key_store = KeyStore::from_config(&config);
        let keypair = key_store.load_or_generate().map_err(|err| {
            AuthError::Config(format!("no usable signing key: {err}"))
        })?;
        Self::assemble(config, key_store, keypair, store, directory)
    }

    /// Like [`AuthEngine::new`] but with an already loaded keypair.
    pub fn with_keypair(
        config: SecurityConfig,
        keypair: Keypair,
        store: Arc<dyn PrincipalStore>,
        directory: Option<Arc<dyn DirectoryAuthenticator>>,
    ) -> AuthResult<Self> {
        validate_config(&config)?;
        let key_store = KeyStore::from_config(&config);
        Self::assemble(config, key_store, keypair, store, directory)
    }

    fn assemble(
        config: SecurityConfig,
        key_store: KeyStore,
        keypair: Keypair,
        store: Arc<dyn PrincipalStore>,
        directory: Option<Arc<dyn DirectoryAuthenticator>>,
    ) -> AuthResult<Self> {
        let codec = TokenCodec::new(
            SharedKeys::new(keypair),
            config.token_validity,
            config.token_leeway_secs,
        );
        let mut contexts = ContextBuilder::new(codec.clone(), store.clone());
        if !config.require_auth {
            let default = config.default_context.as_ref().ok_or_else(|| {
                AuthError::Config("require_auth is disabled but no default_context is configured".into())
            })?;
            warn!(
                usr = %default.username,
                "authentication is disabled, every request runs as the default principal"
            );
            contexts = contexts.with_bypass(default.claims());
        }
        info!(
            validity_secs = config.token_validity.as_secs(),
            directory = directory.is_some(),
            "auth engine ready"
        );
        Ok(Self {
            authorizer: Authorizer::new(store.clone()),
            verifier: CredentialVerifier::new(codec.clone(), store, directory),
            key_store,
            codec,
            contexts,
            config,
        })
    }

    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Name of the cookie carrying the bearer token.
    pub fn cookie_name(&self) -> &str {
        &self.config.token_cookie
    }

    /// Name of the request header carrying the CSRF value.
    pub fn csrf_header_name(&self) -> &str {
        &self.config.csrf_header
    }

    /// Authenticate a request.
    pub async fn context(
        &self,
        request: &RequestCredentials<'_>,
        validate_csrf: Option<bool>,
        level: AuthLevel,
    ) -> SecurityContext {
        self.contexts.build(request, validate_csrf, level).await
    }

    pub async fn check_permissions(
        &self,
        ctx: &mut SecurityContext,
        requested: &[Capability],
        message: Option<&str>,
    ) -> AuthResult<()> {
        self.authorizer
            .check_permissions(ctx, requested, message)
            .await
    }

    pub async fn domain_access(
        &self,
        ctx: &mut SecurityContext,
        read_only: bool,
    ) -> AuthResult<DomainAccess> {
        self.authorizer.domain_access(ctx, read_only).await
    }

    pub async fn login(&self, username: &str, password: &str) -> AuthResult<String> {
        self.verifier.login(username, password).await
    }

    pub async fn refresh(&self, cookie: Option<&str>) -> Option<String> {
        self.verifier.refresh(cookie).await
    }

    pub fn issue(&self, claims: Claims) -> AuthResult<String> {
        self.codec.issue(claims)
    }

    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        self.codec.validate(token)
    }

    /// CSRF value a client must send alongside `token`.
    pub fn csrf_token(&self, token: &str) -> String {
        csrf::derive(token)
    }

    /// Reload the signing keys from disk (or regenerate them) and swap them in.
    ///
    /// Tokens signed with the previous pair stop validating.
    pub fn rotate_keys(&self) -> AuthResult<()> {
        self.key_store
            .reload(self.codec.keys())
            .map_err(|err| AuthError::Config(format!("key rotation failed: {err}")))
    }
}

fn validate_config(config: &SecurityConfig) -> AuthResult<()> {
    config
        .validate()
        .map_err(|err| AuthError::Config(format!("{err:#}")))
}
