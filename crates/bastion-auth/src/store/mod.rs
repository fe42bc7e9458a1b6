//! Collaborator traits the engine consumes.
//!
//! # Purpose
//! The engine never owns users, roles or the directory service. It reaches
//! them through the narrow async traits below so any backend (SQL, LDAP, the
//! in-memory reference store) can be plugged in.
//!
//! # Error model
//! Backends report [`StoreError`]. The engine logs the detail and maps it to a
//! generic client-facing kind; nothing from a `StoreError` reaches a client.
//! [`DirectoryError`] is the exception: its message is shown to the user whose
//! directory login failed.
use crate::capability::CapabilitySet;
use crate::principal::{Principal, PrincipalId};
use async_trait::async_trait;
use thiserror::Error;

pub mod memory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Principal and role-relation lookups.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Principal registered under `username`, if any.
    async fn find_principal(&self, username: &str) -> StoreResult<Option<Principal>>;

    /// Union of the capabilities granted by every role assigned to `id`.
    async fn granted_capabilities(&self, id: PrincipalId) -> StoreResult<CapabilitySet>;

    /// Number of admin role relations held by `id`.
    async fn admin_role_count(&self, id: PrincipalId) -> StoreResult<u64>;
}

/// Why a directory service refused a login.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DirectoryError {
    pub message: String,
}

impl DirectoryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// External identity provider that checks passwords it owns.
#[async_trait]
pub trait DirectoryAuthenticator: Send + Sync {
    async fn authenticate(&self, external_id: &str, password: &str) -> Result<(), DirectoryError>;
}
