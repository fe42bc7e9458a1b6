#![allow(dead_code)]

use bastion_auth::store::memory::{InMemoryDirectory, InMemoryStore};
use bastion_auth::{
    AuthEngine, Capability, DomainScope, Keypair, Principal, PrincipalId, SecurityConfig,
    observability, password,
};
use std::sync::Arc;

pub const SIGNING_KEY: &str = include_str!("../fixtures/signing_key.pem");
pub const SIGNING_KEY_PUB: &str = include_str!("../fixtures/signing_key.pub.pem");
pub const FOREIGN_KEY: &str = include_str!("../fixtures/foreign_key.pem");
pub const FOREIGN_KEY_PUB: &str = include_str!("../fixtures/foreign_key.pub.pem");

pub const PASSWORD: &str = "correct horse battery staple";

pub fn signing_keypair() -> Keypair {
    Keypair::from_pem(SIGNING_KEY, SIGNING_KEY_PUB).expect("signing fixture")
}

pub fn foreign_keypair() -> Keypair {
    Keypair::from_pem(FOREIGN_KEY, FOREIGN_KEY_PUB).expect("foreign fixture")
}

/// Store with a superuser, a domain admin, a read-only auditor, a locked
/// account, a user without roles and a directory-backed user.
pub async fn seeded_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    store
        .define_role(
            "domain-1-admin",
            [Capability::DomainAdmin(DomainScope::Id(1))],
        )
        .await;
    store
        .define_role("auditor", [Capability::SystemAdminReadOnly])
        .await;
    let hash = password::hash_password(PASSWORD).expect("hash");
    let principals = [
        Principal::local(0, "admin", hash.clone()),
        Principal::local(10, "alice", hash.clone()),
        Principal::local(11, "audrey", hash.clone()),
        Principal::local(12, "locked", hash.clone()).with_status(1),
        Principal::local(13, "norole", hash),
        Principal::external(14, "bob", "uid=bob,ou=people"),
    ];
    for principal in principals {
        store.upsert_principal(principal).await;
    }
    for (id, role) in [
        (10, "domain-1-admin"),
        (11, "auditor"),
        (12, "domain-1-admin"),
        (14, "domain-1-admin"),
    ] {
        store
            .assign_role(PrincipalId::new(id), role)
            .await
            .expect("assign role");
    }
    store
}

pub async fn directory() -> InMemoryDirectory {
    let directory = InMemoryDirectory::new();
    directory.add_account("uid=bob,ou=people", "ldap-secret").await;
    directory
}

pub async fn engine_with(config: SecurityConfig) -> (AuthEngine, InMemoryStore) {
    observability::init_tracing();
    let store = seeded_store().await;
    let engine = AuthEngine::with_keypair(
        config,
        signing_keypair(),
        Arc::new(store.clone()),
        Some(Arc::new(directory().await)),
    )
    .expect("engine");
    (engine, store)
}

pub async fn engine() -> (AuthEngine, InMemoryStore) {
    engine_with(SecurityConfig::default()).await
}
