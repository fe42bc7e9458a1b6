//! Capability grants and the satisfaction check.
//!
//! # Purpose
//! Defines the typed capabilities an administrator can hold and decides whether
//! a set of granted capabilities covers a requested set.
//!
//! # Key invariants
//! - Principal id 0 (the superuser) satisfies every request without grants.
//! - A read-write request is never met by a read-only grant.
//! - A grant for the wildcard domain covers every concrete domain. A request
//!   for the wildcard domain means "some domain" and is met by any domain grant
//!   of sufficient strength.
//! - `SystemAdmin` covers everything, `SystemAdminRO` covers every read-only
//!   request.
//!
//! # Textual form
//! `SystemAdmin`, `SystemAdminRO`, `DomainAdmin:<id|*>`, `DomainAdminRO:<id|*>`.
//! Role definitions and configuration use this form.
//!
//! # Examples
//! ```rust
//! use bastion_auth::{Capability, CapabilitySet, DomainScope, PrincipalId, satisfies};
//!
//! let granted: CapabilitySet = ["DomainAdmin:*".parse::<Capability>().unwrap()]
//!     .into_iter()
//!     .collect();
//! let requested = [Capability::DomainAdminReadOnly(DomainScope::Id(7))];
//! assert!(satisfies(PrincipalId::new(12), &granted, &requested));
//! ```
use crate::principal::PrincipalId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Domain a domain-scoped capability applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DomainScope {
    Any,
    Id(u32),
}

impl DomainScope {
    /// Whether a grant scoped to `self` reaches a request scoped to `requested`.
    pub fn covers(self, requested: DomainScope) -> bool {
        match (self, requested) {
            (DomainScope::Any, _) | (_, DomainScope::Any) => true,
            (DomainScope::Id(granted), DomainScope::Id(requested)) => granted == requested,
        }
    }
}

impl std::fmt::Display for DomainScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainScope::Any => f.write_str("*"),
            DomainScope::Id(id) => write!(f, "{id}"),
        }
    }
}

impl std::str::FromStr for DomainScope {
    type Err = CapabilityParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "*" => Ok(DomainScope::Any),
            id => id
                .parse()
                .map(DomainScope::Id)
                .map_err(|_| CapabilityParseError(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid capability: {0}")]
pub struct CapabilityParseError(pub String);

/// A single permission grant or requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Capability {
    SystemAdmin,
    SystemAdminReadOnly,
    DomainAdmin(DomainScope),
    DomainAdminReadOnly(DomainScope),
}

impl Capability {
    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            Capability::SystemAdminReadOnly | Capability::DomainAdminReadOnly(_)
        )
    }

    pub fn domain(self) -> Option<DomainScope> {
        match self {
            Capability::DomainAdmin(scope) | Capability::DomainAdminReadOnly(scope) => Some(scope),
            Capability::SystemAdmin | Capability::SystemAdminReadOnly => None,
        }
    }

    /// Whether holding `self` is enough for an operation requiring `requested`.
    pub fn permits(self, requested: Capability) -> bool {
        match (self, requested) {
            (Capability::SystemAdmin, _) => true,
            (Capability::SystemAdminReadOnly, requested) => requested.is_read_only(),
            (Capability::DomainAdmin(granted), Capability::DomainAdmin(requested))
            | (Capability::DomainAdmin(granted), Capability::DomainAdminReadOnly(requested))
            | (
                Capability::DomainAdminReadOnly(granted),
                Capability::DomainAdminReadOnly(requested),
            ) => granted.covers(requested),
            _ => false,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::SystemAdmin => f.write_str("SystemAdmin"),
            Capability::SystemAdminReadOnly => f.write_str("SystemAdminRO"),
            Capability::DomainAdmin(scope) => write!(f, "DomainAdmin:{scope}"),
            Capability::DomainAdminReadOnly(scope) => write!(f, "DomainAdminRO:{scope}"),
        }
    }
}

impl std::str::FromStr for Capability {
    type Err = CapabilityParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || CapabilityParseError(value.to_string());
        let (name, scope) = match value.split_once(':') {
            Some((name, scope)) => (name.trim(), Some(scope)),
            None => (value.trim(), None),
        };
        match (name, scope) {
            ("SystemAdmin", None) => Ok(Capability::SystemAdmin),
            ("SystemAdminRO", None) => Ok(Capability::SystemAdminReadOnly),
            ("DomainAdmin", Some(scope)) => Ok(Capability::DomainAdmin(
                scope.parse().map_err(|_| invalid())?,
            )),
            ("DomainAdminRO", Some(scope)) => Ok(Capability::DomainAdminReadOnly(
                scope.parse().map_err(|_| invalid())?,
            )),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Capability {
    type Error = CapabilityParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Capability> for String {
    fn from(value: Capability) -> Self {
        value.to_string()
    }
}

/// Domains a principal may see, as needed to filter listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainAccess {
    All,
    Only(BTreeSet<u32>),
}

impl DomainAccess {
    pub fn allows(&self, domain_id: u32) -> bool {
        match self {
            DomainAccess::All => true,
            DomainAccess::Only(ids) => ids.contains(&domain_id),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, DomainAccess::Only(ids) if ids.is_empty())
    }
}

/// Capabilities granted to a principal through its roles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    grants: HashSet<Capability>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, capability: Capability) -> bool {
        self.grants.insert(capability)
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.grants.iter()
    }

    /// Whether any grant in the set permits `requested`.
    pub fn permits(&self, requested: Capability) -> bool {
        self.grants.iter().any(|granted| granted.permits(requested))
    }

    /// Domains reachable through the grants at the requested strength.
    ///
    /// System-wide grants and wildcard domain grants yield [`DomainAccess::All`].
    pub fn domain_access(&self, read_only: bool) -> DomainAccess {
        let mut ids = BTreeSet::new();
        for granted in &self.grants {
            let reaches = match granted {
                Capability::SystemAdmin => return DomainAccess::All,
                Capability::SystemAdminReadOnly if read_only => return DomainAccess::All,
                Capability::SystemAdminReadOnly => None,
                Capability::DomainAdmin(scope) => Some(*scope),
                Capability::DomainAdminReadOnly(scope) if read_only => Some(*scope),
                Capability::DomainAdminReadOnly(_) => None,
            };
            match reaches {
                Some(DomainScope::Any) => return DomainAccess::All,
                Some(DomainScope::Id(id)) => {
                    ids.insert(id);
                }
                None => {}
            }
        }
        DomainAccess::Only(ids)
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self {
            grants: iter.into_iter().collect(),
        }
    }
}

impl Extend<Capability> for CapabilitySet {
    fn extend<T: IntoIterator<Item = Capability>>(&mut self, iter: T) {
        self.grants.extend(iter);
    }
}

/// Whether `principal` holding `granted` may perform an operation requiring all of `requested`.
pub fn satisfies(principal: PrincipalId, granted: &CapabilitySet, requested: &[Capability]) -> bool {
    if principal.is_superuser() {
        return true;
    }
    requested.iter().all(|capability| granted.permits(*capability))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn set(caps: &[&str]) -> CapabilitySet {
        caps.iter()
            .map(|cap| cap.parse::<Capability>().expect("capability"))
            .collect()
    }

    #[test]
    fn capability_string_roundtrip() {
        let caps = [
            Capability::SystemAdmin,
            Capability::SystemAdminReadOnly,
            Capability::DomainAdmin(DomainScope::Any),
            Capability::DomainAdmin(DomainScope::Id(4)),
            Capability::DomainAdminReadOnly(DomainScope::Id(9)),
        ];
        for cap in caps {
            assert_eq!(cap.to_string().parse::<Capability>(), Ok(cap));
        }
        assert_eq!(Capability::SystemAdminReadOnly.to_string(), "SystemAdminRO");
        assert_eq!(
            Capability::DomainAdmin(DomainScope::Any).to_string(),
            "DomainAdmin:*"
        );
    }

    #[test]
    fn capability_parse_rejects_garbage() {
        for raw in ["", "SystemAdmin:3", "DomainAdmin", "DomainAdmin:x", "OrgAdmin:1"] {
            assert!(raw.parse::<Capability>().is_err(), "{raw} should not parse");
        }
    }

    #[test]
    fn capability_serde_uses_text_form() {
        let json = serde_json::to_string(&Capability::DomainAdminReadOnly(DomainScope::Id(3)))
            .expect("serialize");
        assert_eq!(json, "\"DomainAdminRO:3\"");
        let parsed: Capability = serde_json::from_str("\"DomainAdmin:*\"").expect("deserialize");
        assert_eq!(parsed, Capability::DomainAdmin(DomainScope::Any));
        assert!(serde_json::from_str::<Capability>("\"Root\"").is_err());
    }

    #[test]
    fn superuser_needs_no_grants() {
        let requested = [
            Capability::SystemAdmin,
            Capability::DomainAdmin(DomainScope::Id(1)),
        ];
        assert!(satisfies(PrincipalId::SUPERUSER, &CapabilitySet::new(), &requested));
        assert!(!satisfies(PrincipalId::new(1), &CapabilitySet::new(), &requested));
    }

    #[test]
    fn empty_request_is_always_satisfied() {
        assert!(satisfies(PrincipalId::new(5), &CapabilitySet::new(), &[]));
    }

    #[test]
    fn wildcard_domain_grant_covers_concrete_domains() {
        let granted = set(&["DomainAdmin:*"]);
        assert!(granted.permits(Capability::DomainAdmin(DomainScope::Id(17))));
        assert!(granted.permits(Capability::DomainAdminReadOnly(DomainScope::Id(17))));
        assert!(!granted.permits(Capability::SystemAdminReadOnly));
    }

    #[test]
    fn concrete_domain_grant_is_scoped() {
        let granted = set(&["DomainAdmin:3"]);
        assert!(granted.permits(Capability::DomainAdmin(DomainScope::Id(3))));
        assert!(!granted.permits(Capability::DomainAdmin(DomainScope::Id(4))));
        // A wildcard request asks for "some domain".
        assert!(granted.permits(Capability::DomainAdmin(DomainScope::Any)));
    }

    #[test]
    fn read_only_never_satisfies_read_write() {
        let granted = set(&["DomainAdminRO:*", "SystemAdminRO"]);
        assert!(!granted.permits(Capability::DomainAdmin(DomainScope::Id(1))));
        assert!(!granted.permits(Capability::SystemAdmin));
        assert!(granted.permits(Capability::DomainAdminReadOnly(DomainScope::Id(1))));
    }

    #[test]
    fn system_admin_read_only_covers_domain_reads() {
        let granted = set(&["SystemAdminRO"]);
        assert!(granted.permits(Capability::DomainAdminReadOnly(DomainScope::Id(5))));
        assert!(!granted.permits(Capability::DomainAdmin(DomainScope::Id(5))));
    }

    #[test]
    fn system_admin_covers_everything() {
        let granted = set(&["SystemAdmin"]);
        for requested in ["SystemAdminRO", "DomainAdmin:2", "DomainAdminRO:*"] {
            assert!(granted.permits(requested.parse().expect("capability")));
        }
    }

    #[test]
    fn every_requested_capability_must_be_met() {
        let granted = set(&["DomainAdmin:1"]);
        let requested = [
            Capability::DomainAdmin(DomainScope::Id(1)),
            Capability::DomainAdmin(DomainScope::Id(2)),
        ];
        assert!(!satisfies(PrincipalId::new(8), &granted, &requested));
    }

    #[test]
    fn domain_access_collects_ids() {
        let granted = set(&["DomainAdmin:1", "DomainAdminRO:2"]);
        let read = granted.domain_access(true);
        assert_eq!(read, DomainAccess::Only([1, 2].into_iter().collect()));
        assert!(read.allows(2));
        let write = granted.domain_access(false);
        assert_eq!(write, DomainAccess::Only([1].into_iter().collect()));
        assert!(!write.allows(2));
    }

    #[test]
    fn domain_access_widens_for_system_and_wildcard() {
        assert_eq!(set(&["SystemAdmin"]).domain_access(false), DomainAccess::All);
        assert_eq!(set(&["SystemAdminRO"]).domain_access(true), DomainAccess::All);
        assert!(set(&["SystemAdminRO"]).domain_access(false).is_empty());
        assert_eq!(set(&["DomainAdminRO:*"]).domain_access(true), DomainAccess::All);
    }

    fn any_scope() -> impl Strategy<Value = DomainScope> {
        prop_oneof![Just(DomainScope::Any), (0u32..50).prop_map(DomainScope::Id)]
    }

    fn any_capability() -> impl Strategy<Value = Capability> {
        prop_oneof![
            Just(Capability::SystemAdmin),
            Just(Capability::SystemAdminReadOnly),
            any_scope().prop_map(Capability::DomainAdmin),
            any_scope().prop_map(Capability::DomainAdminReadOnly),
        ]
    }

    proptest! {
        #[test]
        fn superuser_satisfies_anything(requested in proptest::collection::vec(any_capability(), 0..8)) {
            prop_assert!(satisfies(PrincipalId::SUPERUSER, &CapabilitySet::new(), &requested));
        }

        #[test]
        fn nobody_else_without_grants(id in 1u32.., requested in proptest::collection::vec(any_capability(), 1..8)) {
            prop_assert!(!satisfies(PrincipalId::new(id), &CapabilitySet::new(), &requested));
        }

        #[test]
        fn wildcard_grant_covers_any_domain(domain in any::<u32>()) {
            let granted: CapabilitySet = [Capability::DomainAdmin(DomainScope::Any)].into_iter().collect();
            prop_assert!(satisfies(
                PrincipalId::new(3),
                &granted,
                &[Capability::DomainAdmin(DomainScope::Id(domain))],
            ));
        }

        #[test]
        fn read_only_grants_never_permit_writes(granted in any_capability(), requested in any_capability()) {
            if granted.is_read_only() && !requested.is_read_only() {
                prop_assert!(!granted.permits(requested));
            }
        }
    }
}
