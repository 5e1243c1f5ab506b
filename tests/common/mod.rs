#![allow(dead_code)]

//! In-process SIGEA backend for integration tests.
//!
//! Serves `/api/login`, `/api/register`, `/api/refresh` and a few resource
//! routes on 127.0.0.1 with a random port. Resources accept only the token
//! the backend issued last, so rotating it makes every client token stale.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    routing::{get, post},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use sigea_session::SigeaClient;
use sigea_session::client_config::ClientConfig;
use sigea_session::gateway::HttpAuthGateway;
use sigea_session::navigation::HistoryNavigator;
use sigea_session::store::MemorySessionStore;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use url::Url;

pub const PASSWORD: &str = "secret123";

/// Build an unsigned token carrying `claims`. The client never verifies
/// signatures, so any third segment will do.
pub fn make_token(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.c2ln", header, payload)
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Default)]
pub struct Counters {
    pub login: AtomicUsize,
    pub register: AtomicUsize,
    pub refresh: AtomicUsize,
    pub resource: AtomicUsize,
}

pub struct BackendState {
    pub counters: Counters,
    current_token: Mutex<String>,
    issued: AtomicUsize,
    /// Refresh answers 401 instead of a new token
    pub reject_refresh: AtomicBool,
    /// Registration answers 400 with a success message instead of 201
    pub ambiguous_register: AtomicBool,
    /// Login answers 500
    pub fail_login: AtomicBool,
    pub refresh_delay: Duration,
}

impl BackendState {
    fn next_token(&self, role: &str) -> String {
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        let token = make_token(&json!({
            "sub": "42",
            "email": "org@sigea.edu",
            "role": role,
            "n": n,
            "exp": now_secs() + 3600,
        }));
        *self.current_token.lock().unwrap() = token.clone();
        token
    }

    pub fn current_token(&self) -> String {
        self.current_token.lock().unwrap().clone()
    }

    /// Invalidate every token handed out so far.
    pub fn rotate(&self) {
        self.next_token("organizador");
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let expected = format!("Bearer {}", self.current_token());
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected)
    }
}

type Shared = Arc<BackendState>;
type Reply = (StatusCode, Json<Value>);

async fn login(State(state): State<Shared>, Json(body): Json<Value>) -> Reply {
    state.counters.login.fetch_add(1, Ordering::SeqCst);
    if state.fail_login.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "Error interno" })),
        );
    }
    if body["password"] != PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Credenciales inválidas" })),
        );
    }
    let token = state.next_token("organizador");
    (
        StatusCode::OK,
        Json(json!({
            "data": { "token": token },
            "user": { "email": body["identifier"], "role": "Organizador" }
        })),
    )
}

async fn register(State(state): State<Shared>, Json(body): Json<Value>) -> Reply {
    state.counters.register.fetch_add(1, Ordering::SeqCst);
    if body["email"].as_str().unwrap_or_default().starts_with("taken") {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "message": "El correo ya está registrado" })),
        );
    }
    if state.ambiguous_register.load(Ordering::SeqCst) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Usuario registrado con éxito" })),
        );
    }
    (StatusCode::CREATED, Json(json!({ "id": 7 })))
}

async fn refresh(State(state): State<Shared>) -> Reply {
    state.counters.refresh.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(state.refresh_delay).await;
    if state.reject_refresh.load(Ordering::SeqCst) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Refresh token inválido" })),
        );
    }
    let token = state.next_token("organizador");
    (StatusCode::OK, Json(json!({ "accessToken": token })))
}

async fn eventos(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    state.counters.resource.fetch_add(1, Ordering::SeqCst);
    if !state.authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "No autorizado" })));
    }
    (StatusCode::OK, Json(json!({ "eventos": [{ "id": 1 }, { "id": 2 }] })))
}

async fn bloqueado(State(state): State<Shared>) -> Reply {
    state.counters.resource.fetch_add(1, Ordering::SeqCst);
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "No autorizado" })))
}

async fn prohibido(State(state): State<Shared>) -> Reply {
    state.counters.resource.fetch_add(1, Ordering::SeqCst);
    (StatusCode::FORBIDDEN, Json(json!({ "message": "Prohibido" })))
}

async fn lento() -> Reply {
    tokio::time::sleep(Duration::from_secs(5)).await;
    (StatusCode::OK, Json(json!({})))
}

pub struct TestBackend {
    pub state: Shared,
    pub api_base: Url,
    server_handle: tokio::task::JoinHandle<()>,
}

impl Drop for TestBackend {
    fn drop(&mut self) {
        self.server_handle.abort();
    }
}

impl TestBackend {
    pub fn refresh_calls(&self) -> usize {
        self.state.counters.refresh.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> usize {
        self.state.counters.login.load(Ordering::SeqCst)
    }

    pub fn register_calls(&self) -> usize {
        self.state.counters.register.load(Ordering::SeqCst)
    }
}

pub async fn spawn_backend() -> TestBackend {
    spawn_backend_with_delay(Duration::from_millis(200)).await
}

pub async fn spawn_backend_with_delay(refresh_delay: Duration) -> TestBackend {
    let state = Arc::new(BackendState {
        counters: Counters::default(),
        current_token: Mutex::new(String::new()),
        issued: AtomicUsize::new(0),
        reject_refresh: AtomicBool::new(false),
        ambiguous_register: AtomicBool::new(false),
        fail_login: AtomicBool::new(false),
        refresh_delay,
    });

    let api = Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/refresh", post(refresh))
        .route("/eventos", get(eventos))
        .route("/bloqueado", get(bloqueado))
        .route("/admin/usuarios", get(prohibido))
        .route("/lento", get(lento))
        .with_state(state.clone());
    let app = Router::new().nest("/api", api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test backend");
    let addr = listener.local_addr().expect("No local address");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test backend failed");
    });

    TestBackend {
        state,
        api_base: Url::parse(&format!("http://{}/api/", addr)).expect("Invalid URL"),
        server_handle,
    }
}

pub struct TestClient {
    pub client: SigeaClient,
    pub navigator: Arc<HistoryNavigator>,
    pub store: Arc<MemorySessionStore>,
}

/// A client talking HTTP to `backend`, with an in-memory session store.
pub fn http_client(backend: &TestBackend, request_timeout: Duration) -> TestClient {
    let mut config = ClientConfig::new(backend.api_base.clone());
    config.request_timeout = request_timeout;

    let gateway = HttpAuthGateway::new(config.api_base.clone(), request_timeout)
        .expect("Failed to build gateway");
    let navigator = Arc::new(HistoryNavigator::new("/organizador/eventos"));
    let store = Arc::new(MemorySessionStore::new());
    let client = SigeaClient::with_parts(
        &config,
        Arc::new(gateway),
        store.clone(),
        navigator.clone(),
    )
    .expect("Failed to build client");

    TestClient {
        client,
        navigator,
        store,
    }
}
