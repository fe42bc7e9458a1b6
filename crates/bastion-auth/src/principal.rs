//! Principal identity model.
//!
//! # Purpose
//! Describes an administrative account as the store hands it out: a numeric id,
//! a login name, an activation status and how its password is checked.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(u32);

impl PrincipalId {
    /// The built-in superuser. Bypasses every permission and eligibility check.
    pub const SUPERUSER: PrincipalId = PrincipalId(0);

    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn is_superuser(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a principal's password is verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthProvider {
    /// Password checked against a stored argon2 PHC string.
    Local { password_hash: String },
    /// Password checked by the directory service under `external_id`.
    External { external_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub username: String,
    /// Zero means active. Any other value is a deactivated account.
    pub status: u32,
    pub provider: AuthProvider,
}

impl Principal {
    pub fn local(id: u32, username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: PrincipalId::new(id),
            username: username.into(),
            status: 0,
            provider: AuthProvider::Local {
                password_hash: password_hash.into(),
            },
        }
    }

    pub fn external(id: u32, username: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            id: PrincipalId::new(id),
            username: username.into(),
            status: 0,
            provider: AuthProvider::External {
                external_id: external_id.into(),
            },
        }
    }

    pub fn with_status(mut self, status: u32) -> Self {
        self.status = status;
        self
    }

    pub fn is_superuser(&self) -> bool {
        self.id.is_superuser()
    }

    /// Deactivation only counts for ordinary accounts.
    pub fn is_deactivated(&self) -> bool {
        !self.is_superuser() && self.status != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superuser_is_never_deactivated() {
        let root = Principal::local(0, "admin", "hash").with_status(3);
        assert!(root.is_superuser());
        assert!(!root.is_deactivated());
        let alice = Principal::local(7, "alice", "hash").with_status(1);
        assert!(alice.is_deactivated());
    }

    #[test]
    fn provider_serializes_with_tag() {
        let value = serde_json::to_value(Principal::external(4, "bob", "uid=bob")).expect("json");
        assert_eq!(value["id"], 4);
        assert_eq!(value["provider"]["kind"], "external");
        assert_eq!(value["provider"]["external_id"], "uid=bob");
    }
}
