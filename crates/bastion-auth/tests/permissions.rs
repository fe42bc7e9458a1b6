mod common;

use bastion_auth::{
    AuthError, Capability, Claims, DomainAccess, DomainScope, SecurityContext,
};
use common::engine;

fn ctx(username: &str) -> SecurityContext {
    SecurityContext::from_claims(Claims::for_principal(username))
}

#[tokio::test]
async fn auditor_reads_everything_and_writes_nothing() {
    let (engine, _) = engine().await;
    let mut audrey = ctx("audrey");
    engine
        .check_permissions(
            &mut audrey,
            &[
                Capability::SystemAdminReadOnly,
                Capability::DomainAdminReadOnly(DomainScope::Id(5)),
            ],
            None,
        )
        .await
        .expect("reads");
    for write in [
        Capability::SystemAdmin,
        Capability::DomainAdmin(DomainScope::Id(5)),
    ] {
        assert_eq!(
            engine.check_permissions(&mut audrey, &[write], None).await,
            Err(AuthError::InsufficientPermissions(None))
        );
    }
    assert_eq!(
        engine.domain_access(&mut audrey, true).await,
        Ok(DomainAccess::All)
    );
    assert!(
        engine
            .domain_access(&mut audrey, false)
            .await
            .expect("access")
            .is_empty()
    );
}

#[tokio::test]
async fn domain_admin_request_for_any_domain() {
    let (engine, _) = engine().await;
    let mut alice = ctx("alice");
    engine
        .check_permissions(
            &mut alice,
            &[Capability::DomainAdmin(DomainScope::Any)],
            None,
        )
        .await
        .expect("holds some domain");
    let access = engine.domain_access(&mut alice, false).await.expect("access");
    assert!(access.allows(1));
    assert!(!access.allows(2));
}

#[tokio::test]
async fn superuser_needs_no_roles() {
    let (engine, _) = engine().await;
    let mut admin = ctx("admin");
    engine
        .check_permissions(
            &mut admin,
            &[
                Capability::SystemAdmin,
                Capability::DomainAdmin(DomainScope::Id(77)),
            ],
            None,
        )
        .await
        .expect("superuser");
}

#[tokio::test]
async fn outage_is_reported_as_lookup_failure() {
    let (engine, store) = engine().await;
    store.set_unavailable(true);
    let err = engine
        .check_permissions(&mut ctx("alice"), &[], None)
        .await
        .expect_err("offline");
    assert_eq!(err, AuthError::PrincipalLookupFailed);
    assert_eq!(err.to_string(), "Failed to get user information from database");
    assert!(err.is_unauthenticated());
}
