// tests/common/mod.rs
pub use axum::Router;
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, head};
use axum::Json;
use serde_json::Value;

use crate::config::service::ServiceConfig;
use crate::model::orchestrator::RequestOrchestrator;

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

/// OData-like backend guarding POST with a CSRF token.
///
/// - `HEAD /service/` hands out `token-<n>` and makes it the accepted token
/// - `POST /service/<any>` answers 403 + `X-CSRF-Token: Required` unless the accepted token is sent
/// - `GET /service/TEAMS`, `/service/TEAMS('1')/Name`, anything else is 404 with an OData error body
#[derive(Default)]
pub struct CsrfBackend {
    pub heads: AtomicUsize,
    pub posts: AtomicUsize,
    pub gets: AtomicUsize,
    pub post_tokens: Mutex<Vec<String>>,
    pub get_tokens: Mutex<Vec<String>>,
    accepted_token: Mutex<Option<String>>,
    /// every POST is answered with 403/required
    pub reject_all_posts: AtomicBool,
    /// HEAD answers 500
    pub fail_heads: AtomicBool,
    /// HEAD answers only after this many POSTs were seen
    pub head_waits_for_posts: AtomicUsize,
    /// GET responses carry this token
    pub rotate_to: Mutex<Option<String>>,
}

impl CsrfBackend {
    pub fn accept_token(&self, token: &str) {
        *self.accepted_token.lock().unwrap() = Some(token.to_owned());
    }

    pub fn post_tokens(&self) -> Vec<String> {
        self.post_tokens.lock().unwrap().clone()
    }

    pub fn get_tokens(&self) -> Vec<String> {
        self.get_tokens.lock().unwrap().clone()
    }

    pub fn requests(&self) -> usize {
        self.heads.load(Ordering::SeqCst)
            + self.posts.load(Ordering::SeqCst)
            + self.gets.load(Ordering::SeqCst)
    }
}

fn csrf_token(headers: &HeaderMap) -> String {
    headers
        .get("x-csrf-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

async fn head_service(State(backend): State<Arc<CsrfBackend>>, headers: HeaderMap) -> Response {
    let n = backend.heads.fetch_add(1, Ordering::SeqCst) + 1;
    assert_eq!(csrf_token(&headers), "Fetch");

    let wait_for = backend.head_waits_for_posts.load(Ordering::SeqCst);
    if wait_for > 0 {
        for _ in 0..1000 {
            if backend.posts.load(Ordering::SeqCst) >= wait_for {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    if backend.fail_heads.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "probe failed").into_response();
    }
    let token = format!("token-{}", n);
    backend.accept_token(&token);
    ([("x-csrf-token", token)], StatusCode::OK).into_response()
}

async fn post_employee(
    State(backend): State<Arc<CsrfBackend>>,
    headers: HeaderMap,
    Json(mut entity): Json<Value>,
) -> Response {
    backend.posts.fetch_add(1, Ordering::SeqCst);
    let token = csrf_token(&headers);
    backend.post_tokens.lock().unwrap().push(token.clone());

    let accepted = backend.accepted_token.lock().unwrap().clone();
    if backend.reject_all_posts.load(Ordering::SeqCst) || accepted.as_deref() != Some(token.as_str()) {
        return (
            StatusCode::FORBIDDEN,
            [("x-csrf-token", "Required")],
            "CSRF token validation failed",
        )
            .into_response();
    }
    entity["@odata.etag"] = json!("W/\"1\"");
    (StatusCode::CREATED, Json(entity)).into_response()
}

async fn get_resource(
    State(backend): State<Arc<CsrfBackend>>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Response {
    backend.gets.fetch_add(1, Ordering::SeqCst);
    backend.get_tokens.lock().unwrap().push(csrf_token(&headers));

    let body = match path.as_str() {
        "TEAMS" => json!({"value": [
            {"Team_Id": "TEAM_01", "Name": "Business Suite", "MEMBER_COUNT": 2},
            {"Team_Id": "TEAM_02", "Name": "SAP NetWeaver", "MEMBER_COUNT": 3},
            {"Team_Id": "TEAM_03", "Name": "Fiori", "MEMBER_COUNT": 1},
        ]}),
        "TEAMS('1')/Name" => json!({"value": "Business Suite"}),
        _ => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"error": {"code": "404", "message": format!("Resource '{}' not found", path)}})),
            )
                .into_response()
        }
    };

    let rotate_to = backend.rotate_to.lock().unwrap().clone();
    match rotate_to {
        Some(token) => ([("x-csrf-token", token)], Json(body)).into_response(),
        None => Json(body).into_response(),
    }
}

pub fn csrf_router(backend: Arc<CsrfBackend>) -> Router {
    Router::new()
        .route("/service/", head(head_service))
        .route("/service/{*path}", get(get_resource).post(post_employee))
        .with_state(backend)
}

/// Backend plus an orchestrator pointing at it.
pub async fn spawn_backend() -> (JoinHandle<()>, Arc<CsrfBackend>, Arc<RequestOrchestrator>) {
    let backend = Arc::new(CsrfBackend::default());
    let (handle, addr) = spawn_axum(csrf_router(backend.clone())).await;
    let config = ServiceConfig::new(format!("http://{}/service/", addr)).unwrap();
    let model = Arc::new(RequestOrchestrator::new(config).unwrap());
    (handle, backend, model)
}
