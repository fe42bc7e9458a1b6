//! Permission checks against a request's security context.
use crate::capability::{Capability, CapabilitySet, DomainAccess, satisfies};
use crate::context::SecurityContext;
use crate::errors::{AuthError, AuthResult};
use crate::principal::Principal;
use crate::store::PrincipalStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Gatekeeper for privileged operations.
#[derive(Clone)]
pub struct Authorizer {
    store: Arc<dyn PrincipalStore>,
}

impl std::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorizer").finish_non_exhaustive()
    }
}

impl Authorizer {
    pub fn new(store: Arc<dyn PrincipalStore>) -> Self {
        Self { store }
    }

    /// Require every capability in `requested` of the context's principal.
    ///
    /// Fails with the context's own authentication failure when there is no
    /// principal, `AccountDeactivated` for a locked account, and
    /// `InsufficientPermissions` carrying `message` when grants fall short.
    pub async fn check_permissions(
        &self,
        ctx: &mut SecurityContext,
        requested: &[Capability],
        message: Option<&str>,
    ) -> AuthResult<()> {
        let principal = self.active_principal(ctx).await?;
        let granted = self.grants(&principal).await?;
        if satisfies(principal.id, &granted, requested) {
            return Ok(());
        }
        debug!(
            usr = %principal.username,
            requested = ?requested.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "permission denied"
        );
        Err(AuthError::InsufficientPermissions(message.map(str::to_string)))
    }

    /// Domains the context's principal may see at the requested strength.
    ///
    /// Used to filter listings instead of failing the whole request.
    pub async fn domain_access(
        &self,
        ctx: &mut SecurityContext,
        read_only: bool,
    ) -> AuthResult<DomainAccess> {
        let principal = self.active_principal(ctx).await?;
        if principal.is_superuser() {
            return Ok(DomainAccess::All);
        }
        Ok(self.grants(&principal).await?.domain_access(read_only))
    }

    async fn active_principal(&self, ctx: &mut SecurityContext) -> AuthResult<Principal> {
        let principal = ctx.resolve_principal(self.store.as_ref()).await?.clone();
        if principal.is_deactivated() {
            debug!(usr = %principal.username, status = principal.status, "account deactivated");
            return Err(AuthError::AccountDeactivated);
        }
        Ok(principal)
    }

    async fn grants(&self, principal: &Principal) -> AuthResult<CapabilitySet> {
        self.store
            .granted_capabilities(principal.id)
            .await
            .map_err(|err| {
                warn!(usr = %principal.username, error = %err, "capability lookup failed");
                AuthError::PrincipalLookupFailed
            })
    }
}
