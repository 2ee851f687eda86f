//! Integration tests for login, registration, logout and the dashboard gate.

#![allow(clippy::unwrap_used)]

use mindwatch_console::api::{ApiClient, PatientProfile, Registration};
use mindwatch_console::services::AuthService;
use mindwatch_console::{ErrorKind, FileSessionStore, SessionStore};
use mindwatch_core::{Role, UserId};
use mindwatch_integration_tests::FakeBackend;
use secrecy::SecretString;
use tempfile::TempDir;

struct Harness {
    backend: FakeBackend,
    api: ApiClient,
    store: FileSessionStore,
    _dir: TempDir,
}

async fn harness() -> Harness {
    let backend = FakeBackend::start().await.unwrap();
    let dir = TempDir::new().unwrap();
    let config = backend.config(dir.path());
    Harness {
        api: ApiClient::from_config(&config).unwrap(),
        store: FileSessionStore::new(config.session_file),
        backend,
        _dir: dir,
    }
}

fn registration(id: &str) -> Registration {
    Registration {
        user_id: UserId::new(id),
        password: SecretString::from("pw"),
        profile: PatientProfile {
            name: "Somchai".to_owned(),
            age: Some(29),
            ..PatientProfile::default()
        },
    }
}

// =============================================================================
// Login
// =============================================================================

#[tokio::test]
async fn test_login_persists_session_and_routes_by_role() {
    let h = harness().await;
    h.backend.add_user("DR-001", "pw", "Dr. Ann");
    let auth = AuthService::new(&h.api, &h.store);

    let route = auth
        .login(&UserId::new("DR-001"), &SecretString::from("pw"))
        .await
        .unwrap();

    assert_eq!(route, "/dashboard/psychiatrist");
    let stored = h.store.load().unwrap().unwrap();
    assert_eq!(stored.id().as_str(), "DR-001");
    assert_eq!(stored.user().display_name(), "Dr. Ann");
}

#[tokio::test]
async fn test_session_survives_a_new_store() {
    let h = harness().await;
    h.backend.add_user("T-7", "pw", "Therapist");
    AuthService::new(&h.api, &h.store)
        .login(&UserId::new("T-7"), &SecretString::from("pw"))
        .await
        .unwrap();

    let reopened = FileSessionStore::new(h.store.path());
    let admitted = AuthService::new(&h.api, &reopened)
        .gate(Role::Therapist)
        .unwrap();
    assert_eq!(admitted.session().id().as_str(), "T-7");
}

#[tokio::test]
async fn test_rejected_login_stores_nothing() {
    let h = harness().await;
    h.backend.add_user("P-001", "right", "Patient");
    let auth = AuthService::new(&h.api, &h.store);

    let err = auth
        .login(&UserId::new("P-001"), &SecretString::from("wrong"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthRequired);
    assert!(h.store.load().unwrap().is_none());
}

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn test_register_then_login_routes_to_patient() {
    let h = harness().await;
    let auth = AuthService::new(&h.api, &h.store);

    let route = auth
        .register_and_login(&registration("P-100"))
        .await
        .unwrap();

    assert_eq!(route, "/dashboard/patient");
    assert!(auth.gate(Role::Patient).is_ok());
}

#[tokio::test]
async fn test_duplicate_registration_is_a_validation_failure() {
    let h = harness().await;
    h.backend.add_user("P-200", "pw", "Existing");
    let auth = AuthService::new(&h.api, &h.store);
    let input = registration("P-200");

    let err = auth.register(&input).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    assert!(err.to_string().contains("already exists"));
    // The input is still there for correction
    assert_eq!(input.profile.name, "Somchai");
    assert!(h.store.load().unwrap().is_none());
}

// =============================================================================
// Gate
// =============================================================================

#[tokio::test]
async fn test_gate_rejects_wrong_role_without_network() {
    let h = harness().await;
    h.backend.add_user("P-001", "pw", "Patient");
    let auth = AuthService::new(&h.api, &h.store);
    auth.login(&UserId::new("P-001"), &SecretString::from("pw"))
        .await
        .unwrap();
    let before = h.backend.total_hits();

    let err = auth.gate(Role::Admin).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthRequired);
    assert_eq!(h.backend.total_hits(), before);
}

#[tokio::test]
async fn test_logout_closes_every_gate() {
    let h = harness().await;
    h.backend.add_user("ADMIN1", "pw", "Admin");
    let auth = AuthService::new(&h.api, &h.store);
    auth.login(&UserId::new("ADMIN1"), &SecretString::from("pw"))
        .await
        .unwrap();
    assert!(auth.gate(Role::Admin).is_ok());

    auth.logout().unwrap();

    for role in Role::ALL {
        assert_eq!(auth.gate(role).unwrap_err().kind(), ErrorKind::AuthRequired);
    }
    assert!(!h.store.path().exists());
}

#[tokio::test]
async fn test_health() {
    let h = harness().await;
    let health = h.api.health().await.unwrap();
    assert_eq!(health.status, "ok");
    assert!(health.ai_ready);
    assert_eq!(h.backend.hits("health"), 1);
}

#[tokio::test]
async fn test_unreachable_backend_is_a_network_failure() {
    let base = url::Url::parse("http://127.0.0.1:9/api").unwrap();
    let api = ApiClient::new(base, std::time::Duration::from_secs(2)).unwrap();
    let err = mindwatch_console::ConsoleError::from(api.health().await.unwrap_err());
    assert_eq!(err.kind(), ErrorKind::NetworkFailure);
}
