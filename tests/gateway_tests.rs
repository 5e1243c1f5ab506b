//! Tests for login and registration against the REST backend.

mod common;

use common::{PASSWORD, http_client, spawn_backend};
use sigea_session::auth::{
    AuthError, Credentials, RegisterFields, Role, SessionController, SessionState,
};
use sigea_session::gateway::{AuthGateway, HttpAuthGateway, RefreshRequest};
use sigea_session::store::{MemorySessionStore, SessionStore};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use url::Url;

const TIMEOUT: Duration = Duration::from_secs(5);

fn fields(email: &str) -> RegisterFields {
    RegisterFields {
        first_name: "Ana".into(),
        last_name: "Quispe".into(),
        email: email.into(),
        password: PASSWORD.into(),
        password_confirmation: Some(PASSWORD.into()),
        phone: None,
        institution: Some("UNSA".into()),
    }
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_login_normalizes_nested_response() {
    let backend = spawn_backend().await;
    let test = http_client(&backend, TIMEOUT);
    test.client.initialize().await;

    let role = test
        .client
        .controller
        .login(&Credentials::new("org@sigea.edu", PASSWORD))
        .await
        .unwrap();
    assert_eq!(role, Role::Organizador);

    let session = test.store.load().await.unwrap().unwrap();
    assert_eq!(session.token, backend.state.current_token());
    assert_eq!(session.email, "org@sigea.edu");
    assert_eq!(session.refresh_token, None);
}

#[tokio::test]
async fn test_login_rejected_with_invalid_credentials() {
    let backend = spawn_backend().await;
    let test = http_client(&backend, TIMEOUT);
    test.client.initialize().await;

    let result = test
        .client
        .controller
        .login(&Credentials::new("org@sigea.edu", "wrong"))
        .await;
    assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    assert_eq!(test.client.controller.state(), SessionState::Anonymous);
    assert_eq!(test.store.load().await.unwrap(), None);
}

#[tokio::test]
async fn test_login_server_error_leaves_state_untouched() {
    let backend = spawn_backend().await;
    backend.state.fail_login.store(true, Ordering::SeqCst);
    let test = http_client(&backend, TIMEOUT);
    test.client.initialize().await;

    let result = test
        .client
        .controller
        .login(&Credentials::new("org@sigea.edu", PASSWORD))
        .await;
    match result {
        Err(e @ AuthError::ServerError(_)) => assert!(e.is_retryable()),
        other => panic!("Expected ServerError, got {:?}", other),
    }
    assert_eq!(backend.login_calls(), 1);
    assert_eq!(test.client.controller.state(), SessionState::Anonymous);
    assert_eq!(test.store.load().await.unwrap(), None);
}

#[tokio::test]
async fn test_login_against_closed_port_is_network_error() {
    // Reserve a port, then free it so nothing listens there
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let base = Url::parse(&format!("http://127.0.0.1:{}/api/", port)).unwrap();
    let store = Arc::new(MemorySessionStore::new());
    let controller = SessionController::new(
        Arc::new(HttpAuthGateway::new(base, TIMEOUT).unwrap()),
        store.clone(),
        Duration::from_secs(1),
        None,
    );
    controller.initialize().await;

    let result = controller
        .login(&Credentials::new("org@sigea.edu", PASSWORD))
        .await;
    assert!(matches!(result, Err(AuthError::NetworkError(_))));
    assert_eq!(controller.state(), SessionState::Anonymous);
    assert_eq!(store.load().await.unwrap(), None);
}

#[tokio::test]
async fn test_refresh_endpoint_returns_new_token() {
    let backend = spawn_backend_quick().await;
    let gateway = HttpAuthGateway::new(backend.api_base.clone(), TIMEOUT).unwrap();

    let refreshed = gateway
        .refresh(&RefreshRequest {
            token: Some("old.token.value".into()),
            refresh_token: None,
        })
        .await
        .unwrap();
    assert_eq!(refreshed.token, backend.state.current_token());

    backend.state.reject_refresh.store(true, Ordering::SeqCst);
    let result = gateway
        .refresh(&RefreshRequest {
            token: Some(refreshed.token),
            refresh_token: None,
        })
        .await;
    assert!(matches!(result, Err(AuthError::RefreshFailed(_))));
}

async fn spawn_backend_quick() -> common::TestBackend {
    common::spawn_backend_with_delay(Duration::ZERO).await
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_register_then_login() {
    let backend = spawn_backend().await;
    let test = http_client(&backend, TIMEOUT);
    test.client.initialize().await;

    let role = test
        .client
        .controller
        .register(&fields("ana@sigea.edu"))
        .await
        .unwrap();
    assert_eq!(role, Role::Organizador);
    assert_eq!(backend.register_calls(), 1);
    assert_eq!(backend.login_calls(), 1);
    assert!(test.client.controller.state().is_authenticated());
}

#[tokio::test]
async fn test_register_client_error_with_success_message_is_accepted() {
    let backend = spawn_backend().await;
    backend.state.ambiguous_register.store(true, Ordering::SeqCst);
    let test = http_client(&backend, TIMEOUT);
    test.client.initialize().await;

    let role = test
        .client
        .controller
        .register(&fields("ana@sigea.edu"))
        .await
        .unwrap();
    assert_eq!(role, Role::Organizador);
    assert_eq!(backend.register_calls(), 1);
    assert_eq!(backend.login_calls(), 1);
    assert_eq!(
        test.client.controller.state(),
        SessionState::Authenticated {
            role: Role::Organizador,
            email: "ana@sigea.edu".into(),
        }
    );
}

#[tokio::test]
async fn test_register_conflict_is_invalid_input() {
    let backend = spawn_backend().await;
    let test = http_client(&backend, TIMEOUT);
    test.client.initialize().await;

    let result = test
        .client
        .controller
        .register(&fields("taken@sigea.edu"))
        .await;
    match result {
        Err(AuthError::InvalidInput(message)) => assert!(message.contains("ya está registrado")),
        other => panic!("Expected InvalidInput, got {:?}", other),
    }
    assert_eq!(backend.login_calls(), 0);
    assert_eq!(test.client.controller.state(), SessionState::Anonymous);
}

#[tokio::test]
async fn test_invalid_fields_never_reach_backend() {
    let backend = spawn_backend().await;
    let test = http_client(&backend, TIMEOUT);
    test.client.initialize().await;

    let mut mismatched = fields("ana@sigea.edu");
    mismatched.password_confirmation = Some("different".into());
    let result = test.client.controller.register(&mismatched).await;
    assert!(matches!(result, Err(AuthError::InvalidInput(_))));

    let mut short = fields("ana@sigea.edu");
    short.password = "123".into();
    short.password_confirmation = None;
    let result = test.client.controller.register(&short).await;
    assert!(matches!(result, Err(AuthError::InvalidInput(_))));

    assert_eq!(backend.register_calls(), 0);
}
