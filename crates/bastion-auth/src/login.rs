//! Password login and token refresh.
//!
//! # Purpose
//! Exchanges a username and password for a bearer token, and renews a still
//! valid token for a principal that is still allowed to log in.
//!
//! # Key invariants
//! - An unknown username and a wrong password fail the same way, with
//!   comparable timing.
//! - A correct password never bypasses an administrative lock or a missing
//!   admin role.
//! - Refresh never reports why it declined.
use crate::claims::Claims;
use crate::context::lookup_principal;
use crate::errors::{AuthError, AuthResult};
use crate::password;
use crate::principal::{AuthProvider, Principal};
use crate::store::{DirectoryAuthenticator, PrincipalStore};
use crate::token::TokenCodec;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DIRECTORY_UNAVAILABLE: &str = "directory service unavailable";

#[derive(Clone)]
pub struct CredentialVerifier {
    codec: TokenCodec,
    store: Arc<dyn PrincipalStore>,
    directory: Option<Arc<dyn DirectoryAuthenticator>>,
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVerifier")
            .field("codec", &self.codec)
            .field("directory", &self.directory.is_some())
            .finish_non_exhaustive()
    }
}

impl CredentialVerifier {
    pub fn new(
        codec: TokenCodec,
        store: Arc<dyn PrincipalStore>,
        directory: Option<Arc<dyn DirectoryAuthenticator>>,
    ) -> Self {
        Self {
            codec,
            store,
            directory,
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> AuthResult<String> {
        let principal = match lookup_principal(self.store.as_ref(), username).await {
            Ok(principal) => principal,
            Err(AuthError::PrincipalNotFound) => {
                password::burn_verification(password);
                info!(usr = %username, "login failed: unknown user");
                return Err(AuthError::InvalidCredentials);
            }
            Err(err) => return Err(err),
        };
        self.verify_password(&principal, password).await?;
        self.ensure_login_allowed(&principal).await?;
        let token = self.codec.issue(Claims::for_principal(&principal.username))?;
        info!(usr = %principal.username, id = %principal.id, "login succeeded");
        Ok(token)
    }

    /// Re-issue `cookie` with a fresh expiry, or `None` if it cannot be renewed.
    pub async fn refresh(&self, cookie: Option<&str>) -> Option<String> {
        let claims = match self.codec.validate(cookie?) {
            Ok(claims) => claims,
            Err(err) => {
                debug!(error = %err, "refresh declined: token rejected");
                return None;
            }
        };
        let principal = match lookup_principal(self.store.as_ref(), &claims.usr).await {
            Ok(principal) => principal,
            Err(err) => {
                debug!(usr = %claims.usr, error = %err, "refresh declined: principal unavailable");
                return None;
            }
        };
        if let Err(err) = self.ensure_login_allowed(&principal).await {
            debug!(usr = %claims.usr, error = %err, "refresh declined: login not allowed");
            return None;
        }
        match self.codec.issue(TokenCodec::refresh_claims(claims)) {
            Ok(token) => Some(token),
            Err(err) => {
                debug!(usr = %principal.username, error = %err, "refresh declined");
                None
            }
        }
    }

    async fn verify_password(&self, principal: &Principal, password: &str) -> AuthResult<()> {
        match &principal.provider {
            AuthProvider::Local { password_hash } => {
                if password::verify_password(password, password_hash) {
                    Ok(())
                } else {
                    info!(usr = %principal.username, "login failed: wrong password");
                    Err(AuthError::InvalidCredentials)
                }
            }
            AuthProvider::External { external_id } => {
                let Some(directory) = &self.directory else {
                    warn!(usr = %principal.username, "no directory service configured");
                    return Err(AuthError::ExternalAuthFailed(DIRECTORY_UNAVAILABLE.to_string()));
                };
                directory
                    .authenticate(external_id, password)
                    .await
                    .map_err(|err| {
                        info!(usr = %principal.username, error = %err, "directory login failed");
                        AuthError::ExternalAuthFailed(err.message)
                    })
            }
        }
    }

    /// Superuser, or an active account holding at least one admin role.
    async fn ensure_login_allowed(&self, principal: &Principal) -> AuthResult<()> {
        if principal.is_superuser() {
            return Ok(());
        }
        if principal.is_deactivated() {
            info!(usr = %principal.username, status = principal.status, "login refused: account deactivated");
            return Err(AuthError::AccountDeactivated);
        }
        let roles = self
            .store
            .admin_role_count(principal.id)
            .await
            .map_err(|err| {
                warn!(usr = %principal.username, error = %err, "role lookup failed");
                AuthError::PrincipalLookupFailed
            })?;
        if roles == 0 {
            info!(usr = %principal.username, "login refused: no admin roles");
            return Err(AuthError::LoginDenied);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capability;
    use crate::keys::{Keypair, SharedKeys};
    use crate::principal::PrincipalId;
    use crate::store::memory::{InMemoryDirectory, InMemoryStore};
    use crate::token::now_epoch_seconds;
    use std::time::Duration;

    const SIGNING_KEY: &str = include_str!("../tests/fixtures/signing_key.pem");
    const SIGNING_KEY_PUB: &str = include_str!("../tests/fixtures/signing_key.pub.pem");

    fn codec() -> TokenCodec {
        let keypair = Keypair::from_pem(SIGNING_KEY, SIGNING_KEY_PUB).expect("fixture");
        TokenCodec::new(SharedKeys::new(keypair), Duration::from_secs(600), 0)
    }

    async fn store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.define_role("admin", [Capability::SystemAdmin]).await;
        let hash = password::hash_password("s3cret").expect("hash");
        store
            .upsert_principal(Principal::local(0, "admin", hash.clone()))
            .await;
        store
            .upsert_principal(Principal::local(2, "alice", hash.clone()))
            .await;
        store
            .upsert_principal(Principal::local(3, "locked", hash.clone()).with_status(1))
            .await;
        store
            .upsert_principal(Principal::local(4, "norole", hash))
            .await;
        store
            .upsert_principal(Principal::external(5, "bob", "uid=bob"))
            .await;
        for id in [2, 3, 5] {
            store
                .assign_role(PrincipalId::new(id), "admin")
                .await
                .expect("assign");
        }
        store
    }

    async fn verifier() -> (CredentialVerifier, InMemoryStore) {
        let store = store().await;
        let directory = InMemoryDirectory::new();
        directory.add_account("uid=bob", "ldap-pass").await;
        let verifier = CredentialVerifier::new(
            codec(),
            Arc::new(store.clone()),
            Some(Arc::new(directory)),
        );
        (verifier, store)
    }

    #[tokio::test]
    async fn local_login_issues_a_token_for_the_principal() {
        let (verifier, _) = verifier().await;
        let token = verifier.login("alice", "s3cret").await.expect("login");
        let claims = verifier.codec.validate(&token).expect("valid");
        assert_eq!(claims.usr, "alice");
        assert!(claims.extra.is_empty());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_alike() {
        let (verifier, _) = verifier().await;
        let wrong = verifier.login("alice", "wrong").await.expect_err("wrong");
        let ghost = verifier.login("ghost", "x").await.expect_err("ghost");
        assert_eq!(wrong, AuthError::InvalidCredentials);
        assert_eq!(wrong, ghost);
        assert_eq!(ghost.to_string(), "Invalid username or password");
    }

    #[tokio::test]
    async fn eligibility_is_checked_after_the_password() {
        let (verifier, _) = verifier().await;
        assert_eq!(
            verifier.login("locked", "s3cret").await,
            Err(AuthError::AccountDeactivated)
        );
        assert_eq!(
            verifier.login("locked", "wrong").await,
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(
            verifier.login("norole", "s3cret").await,
            Err(AuthError::LoginDenied)
        );
        verifier
            .login("admin", "s3cret")
            .await
            .expect("superuser needs no roles");
    }

    #[tokio::test]
    async fn external_principals_use_the_directory() {
        let (verifier, _) = verifier().await;
        verifier.login("bob", "ldap-pass").await.expect("directory login");
        assert_eq!(
            verifier.login("bob", "nope").await,
            Err(AuthError::ExternalAuthFailed("Invalid credentials".to_string()))
        );
    }

    #[tokio::test]
    async fn external_login_without_directory_fails() {
        let store = store().await;
        let verifier = CredentialVerifier::new(codec(), Arc::new(store), None);
        assert_eq!(
            verifier.login("bob", "ldap-pass").await,
            Err(AuthError::ExternalAuthFailed(DIRECTORY_UNAVAILABLE.to_string()))
        );
    }

    #[tokio::test]
    async fn store_outage_is_not_invalid_credentials() {
        let (verifier, store) = verifier().await;
        store.set_unavailable(true);
        assert_eq!(
            verifier.login("alice", "s3cret").await,
            Err(AuthError::PrincipalLookupFailed)
        );
    }

    #[tokio::test]
    async fn refresh_renews_valid_tokens() {
        let (verifier, _) = verifier().await;
        let old = verifier
            .codec
            .issue(
                Claims::for_principal("alice")
                    .with_expiry(now_epoch_seconds() + 5)
                    .with_claim("lang", "en"),
            )
            .expect("issue");
        let renewed = verifier.refresh(Some(&old)).await.expect("renewed");
        let claims = verifier.codec.validate(&renewed).expect("valid");
        assert!(claims.exp.expect("exp") > now_epoch_seconds() + 500);
        assert_eq!(claims.extra.get("lang"), Some(&serde_json::json!("en")));
    }

    #[tokio::test]
    async fn refresh_declines_quietly() {
        let (verifier, store) = verifier().await;
        assert!(verifier.refresh(None).await.is_none());
        assert!(verifier.refresh(Some("garbage")).await.is_none());

        let expired = verifier
            .codec
            .issue(Claims::for_principal("alice").with_expiry(now_epoch_seconds() - 60))
            .expect("issue");
        assert!(verifier.refresh(Some(&expired)).await.is_none());

        let locked = verifier
            .codec
            .issue(Claims::for_principal("locked"))
            .expect("issue");
        assert!(verifier.refresh(Some(&locked)).await.is_none());

        let alice = verifier
            .codec
            .issue(Claims::for_principal("alice"))
            .expect("issue");
        store.revoke_role(PrincipalId::new(2), "admin").await;
        assert!(verifier.refresh(Some(&alice)).await.is_none());
    }
}
