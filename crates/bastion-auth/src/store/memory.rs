//! In-memory implementation of the principal store and directory.
//!
//! # Purpose
//! Implements [`PrincipalStore`] and [`DirectoryAuthenticator`] entirely in
//! memory with `HashMap`s guarded by `tokio::sync::RwLock`. It exists for:
//! - tests (no database or directory needed)
//! - embedders that provision a handful of administrators at startup
//!
//! # Model
//! Roles are named lists of capabilities. A principal holds zero or more roles;
//! each held role counts as one admin role relation for login eligibility, and
//! the granted capability set is the union over all held roles.
//!
//! # Durability
//! Not durable: all state is lost when the store is dropped.
use super::{DirectoryAuthenticator, DirectoryError, PrincipalStore, StoreError, StoreResult};
use crate::capability::{Capability, CapabilitySet};
use crate::principal::{Principal, PrincipalId};
use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    principals: Arc<RwLock<HashMap<String, Principal>>>,
    roles: Arc<RwLock<HashMap<String, Vec<Capability>>>>,
    assignments: Arc<RwLock<HashMap<PrincipalId, BTreeSet<String>>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a principal, keyed by username.
    pub async fn upsert_principal(&self, principal: Principal) {
        self.principals
            .write()
            .await
            .insert(principal.username.clone(), principal);
    }

    pub async fn remove_principal(&self, username: &str) -> Option<Principal> {
        let removed = self.principals.write().await.remove(username);
        if let Some(principal) = &removed {
            self.assignments.write().await.remove(&principal.id);
        }
        removed
    }

    /// Define or redefine a role.
    pub async fn define_role(
        &self,
        name: impl Into<String>,
        capabilities: impl IntoIterator<Item = Capability>,
    ) {
        self.roles
            .write()
            .await
            .insert(name.into(), capabilities.into_iter().collect());
    }

    pub async fn assign_role(&self, id: PrincipalId, role: &str) -> StoreResult<()> {
        if !self.roles.read().await.contains_key(role) {
            return Err(StoreError::Unexpected(anyhow!("unknown role {role}")));
        }
        self.assignments
            .write()
            .await
            .entry(id)
            .or_default()
            .insert(role.to_string());
        Ok(())
    }

    pub async fn revoke_role(&self, id: PrincipalId, role: &str) -> bool {
        self.assignments
            .write()
            .await
            .get_mut(&id)
            .is_some_and(|held| held.remove(role))
    }

    /// Make every lookup fail with [`StoreError::Unavailable`] until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl PrincipalStore for InMemoryStore {
    async fn find_principal(&self, username: &str) -> StoreResult<Option<Principal>> {
        self.ensure_available()?;
        Ok(self.principals.read().await.get(username).cloned())
    }

    async fn granted_capabilities(&self, id: PrincipalId) -> StoreResult<CapabilitySet> {
        self.ensure_available()?;
        let assignments = self.assignments.read().await;
        let Some(held) = assignments.get(&id) else {
            return Ok(CapabilitySet::new());
        };
        let roles = self.roles.read().await;
        Ok(held
            .iter()
            .filter_map(|role| roles.get(role))
            .flatten()
            .copied()
            .collect())
    }

    async fn admin_role_count(&self, id: PrincipalId) -> StoreResult<u64> {
        self.ensure_available()?;
        Ok(self
            .assignments
            .read()
            .await
            .get(&id)
            .map_or(0, |held| held.len() as u64))
    }
}

/// Directory keyed by external id with plaintext passwords, for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    accounts: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_account(&self, external_id: impl Into<String>, password: impl Into<String>) {
        self.accounts
            .write()
            .await
            .insert(external_id.into(), password.into());
    }
}

#[async_trait]
impl DirectoryAuthenticator for InMemoryDirectory {
    async fn authenticate(&self, external_id: &str, password: &str) -> Result<(), DirectoryError> {
        match self.accounts.read().await.get(external_id) {
            None => Err(DirectoryError::new(format!(
                "no directory entry for {external_id}"
            ))),
            Some(expected) if expected == password => Ok(()),
            Some(_) => Err(DirectoryError::new("Invalid credentials")),
        }
    }
}
