//! Integration tests for the admin bootstrap guard.
//!
//! The fake store grants admin to the first caller presenting
//! [`ADMIN_SECRET`] and rejects every later claim as already assigned.

#![allow(clippy::unwrap_used)]

use machinery_store_client::{
    AccessState, AdminGuard, CacheConfig, ClaimError, ClaimStatus, ClientError, StoreClient,
};
use machinery_store_integration_tests::{ADMIN_SECRET, FakeStore};
use secrecy::SecretString;

fn guard() -> AdminGuard {
    AdminGuard::new(StoreClient::new(&CacheConfig::default()))
}

fn secret(value: &str) -> SecretString {
    SecretString::from(value)
}

#[tokio::test]
async fn test_login_queries_role_from_server() {
    let store = FakeStore::new();
    let mut guard = guard();

    let state = guard.login(store.backend_for(Some("alice"))).await.unwrap();
    assert!(matches!(
        state,
        AccessState::AuthenticatedNonAdmin {
            claim: ClaimStatus::Open,
            ..
        }
    ));
    assert_eq!(store.calls("isCallerAdmin"), 1);
    assert!(!guard.can_write());
}

#[tokio::test]
async fn test_existing_admin_logs_in_as_admin() {
    let store = FakeStore::new();
    store.grant_admin("alice");
    let mut guard = guard();

    guard.login(store.backend_for(Some("alice"))).await.unwrap();
    assert!(guard.state().is_admin());
    assert_eq!(guard.require_admin().unwrap().as_str(), "alice");
}

#[tokio::test]
async fn test_anonymous_login_stays_unauthenticated() {
    let store = FakeStore::new();
    let mut guard = guard();

    let state = guard.login(store.backend_for(None)).await.unwrap();
    assert_eq!(*state, AccessState::Unauthenticated);
    assert!(guard.client().is_connected());
    assert_eq!(store.calls("isCallerAdmin"), 0);
}

#[tokio::test]
async fn test_first_claim_grants_admin() {
    let store = FakeStore::new();
    let mut guard = guard();
    guard.login(store.backend_for(Some("alice"))).await.unwrap();

    let state = guard.claim(secret(ADMIN_SECRET)).await.unwrap();
    assert!(state.is_admin());
    assert!(guard.can_write());
    assert_eq!(store.calls("isCallerAdmin"), 2);
}

#[tokio::test]
async fn test_second_claim_conflicts() {
    let store = FakeStore::new();
    let mut first = guard();
    first.login(store.backend_for(Some("alice"))).await.unwrap();
    first.claim(secret(ADMIN_SECRET)).await.unwrap();

    let mut second = guard();
    second.login(store.backend_for(Some("bob"))).await.unwrap();
    let err = second.claim(secret(ADMIN_SECRET)).await.unwrap_err();
    assert!(matches!(err, ClaimError::AlreadyAssigned(_)));
    assert!(matches!(
        second.state(),
        AccessState::AuthenticatedNonAdmin {
            claim: ClaimStatus::Locked,
            ..
        }
    ));
    assert!(!second.client().is_admin().await.unwrap());

    // Locked: no further remote attempts this session
    let calls = store.calls("assignCallerUserRole");
    let err = second.claim(secret(ADMIN_SECRET)).await.unwrap_err();
    assert!(matches!(err, ClaimError::AlreadyAssigned(_)));
    assert_eq!(store.calls("assignCallerUserRole"), calls);
}

#[tokio::test]
async fn test_repeat_claim_by_admin_keeps_admin() {
    let store = FakeStore::new();
    let mut guard = guard();
    guard.login(store.backend_for(Some("alice"))).await.unwrap();
    guard.claim(secret(ADMIN_SECRET)).await.unwrap();

    let err = guard.claim(secret(ADMIN_SECRET)).await.unwrap_err();
    assert!(matches!(err, ClaimError::AlreadyAssigned(_)));
    assert!(guard.state().is_admin());
}

#[tokio::test]
async fn test_wrong_token_allows_retry() {
    let store = FakeStore::new();
    let mut guard = guard();
    guard.login(store.backend_for(Some("alice"))).await.unwrap();

    let err = guard.claim(secret("guess")).await.unwrap_err();
    assert!(matches!(err, ClaimError::IncorrectToken(_)));
    assert!(matches!(
        guard.state(),
        AccessState::AuthenticatedNonAdmin {
            claim: ClaimStatus::Open,
            ..
        }
    ));

    let state = guard.claim(secret(ADMIN_SECRET)).await.unwrap();
    assert!(state.is_admin());
}

#[tokio::test]
async fn test_blank_token_rejected_locally() {
    let store = FakeStore::new();
    let mut guard = guard();
    guard.login(store.backend_for(Some("alice"))).await.unwrap();

    let err = guard.claim(secret("   ")).await.unwrap_err();
    assert!(matches!(
        err,
        ClaimError::Client(ClientError::Validation(_))
    ));
    assert_eq!(store.calls("assignCallerUserRole"), 0);
}

#[tokio::test]
async fn test_logout_forgets_role() {
    let store = FakeStore::new();
    store.grant_admin("alice");
    let mut guard = guard();
    guard.login(store.backend_for(Some("alice"))).await.unwrap();
    assert!(guard.can_write());

    guard.logout();
    assert_eq!(*guard.state(), AccessState::Unauthenticated);
    assert!(!guard.client().is_connected());
    assert!(matches!(
        guard.require_admin(),
        Err(ClientError::Unauthorized(_))
    ));

    // A new session asks the server again
    guard.login(store.backend_for(Some("alice"))).await.unwrap();
    assert!(guard.can_write());
    assert_eq!(store.calls("isCallerAdmin"), 2);
}

#[tokio::test]
async fn test_relogin_clears_claim_lock() {
    let store = FakeStore::new();
    store.grant_admin("alice");
    let mut guard = guard();
    guard.login(store.backend_for(Some("bob"))).await.unwrap();
    guard.claim(secret(ADMIN_SECRET)).await.unwrap_err();

    guard.login(store.backend_for(Some("bob"))).await.unwrap();
    assert!(matches!(
        guard.state(),
        AccessState::AuthenticatedNonAdmin {
            claim: ClaimStatus::Open,
            ..
        }
    ));
}

#[tokio::test]
async fn test_session_switch_behind_guard_drops_admin() {
    let store = FakeStore::new();
    let mut guard = guard();
    guard.login(store.backend_for(Some("alice"))).await.unwrap();
    guard.claim(secret(ADMIN_SECRET)).await.unwrap();
    assert!(guard.can_write());

    // Another holder of the shared client reconnects as bob
    let shared = guard.client().clone();
    shared.connect(store.backend_for(Some("bob")));

    assert!(!shared.is_admin().await.unwrap());
    assert!(!guard.can_write());
    assert_eq!(*guard.state(), AccessState::Unauthenticated);
    assert!(matches!(
        guard.require_admin(),
        Err(ClientError::Unauthorized(_))
    ));
    let err = guard.claim(secret(ADMIN_SECRET)).await.unwrap_err();
    assert!(matches!(err, ClaimError::NotAuthenticated));

    // Logging in again asks the server about the new caller
    let state = guard.login(store.backend_for(Some("bob"))).await.unwrap();
    assert!(!state.is_admin());
}

#[tokio::test]
async fn test_disconnect_behind_guard_drops_admin() {
    let store = FakeStore::new();
    store.grant_admin("alice");
    let mut guard = guard();
    guard.login(store.backend_for(Some("alice"))).await.unwrap();
    assert!(guard.can_write());

    guard.client().disconnect();
    assert!(!guard.can_write());
    assert!(guard.state().principal().is_none());

    let state = guard.refresh().await.unwrap();
    assert_eq!(*state, AccessState::Unauthenticated);
}
