#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{Method, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use graph_memory::api::{self, AppState};
use graph_memory::db;
use serde_json::{json, Value};
use tower::ServiceExt;

/// Fresh API state over an in-memory database, no embedding worker.
pub fn api_state() -> (AppState, Arc<Mutex<rusqlite::Connection>>) {
    let conn = db::open_memory_database().unwrap();
    let db = Arc::new(Mutex::new(conn));
    (AppState::new(Arc::clone(&db), None), db)
}

/// Send one request through `router` and decode the JSON response.
pub async fn send(router: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

/// One request as seen by [`MockBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub body: Option<Value>,
}

/// Recording HTTP backend on an ephemeral port.
///
/// - `/fail/...` answers 503 with body `backend down`
/// - `/text...` answers 200 with a non-JSON body
/// - anything else echoes `{"path", "query", "body"}` as JSON
pub struct MockBackend {
    pub base_url: String,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockBackend {
    pub async fn spawn() -> Self {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new().fallback(record).with_state(Arc::clone(&calls));
        let base_url = serve(app).await;
        Self { base_url, calls }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

async fn record(
    State(calls): State<Arc<Mutex<Vec<RecordedCall>>>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let body_json: Option<Value> = serde_json::from_slice(&body).ok();
    calls.lock().unwrap().push(RecordedCall {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        body: body_json.clone(),
    });

    if uri.path().starts_with("/fail") {
        return (StatusCode::SERVICE_UNAVAILABLE, "backend down").into_response();
    }
    if uri.path().starts_with("/text") {
        return "plain text, not json".into_response();
    }
    Json(json!({
        "path": uri.path(),
        "query": uri.query(),
        "body": body_json,
    }))
    .into_response()
}

/// Serve `app` on `127.0.0.1:0` in the background and return its base URL.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Spin up the real Graph Memory API over an in-memory database.
pub async fn spawn_api() -> String {
    let (state, _db) = api_state();
    serve(api::router(state)).await
}

/// Gateway YAML covering every dispatch path, pointed at `base_url`.
pub fn gateway_yaml(base_url: &str, events_enabled: bool) -> String {
    format!(
        r#"
meta:
  gateway_name: test-gateway
  backend_base_url: {base_url}
  cors_allowed_origins: ["*"]
  websockets:
    enabled: {events_enabled}
  request_timeout_secs: 2
middleware:
  logging:
    level: debug
tools:
  get_node_children:
    http:
      method: GET
      path: "/nodes/{{id}}/children"
  add_message:
    http:
      method: POST
      path: "/messages"
    on_success:
      broadcast:
        topic: chat
        payload_template: "{{conversation_id}}:{{text}}"
  create_conversation:
    http:
      method: POST
      path: "/conversations"
  list_conversations:
    http:
      method: GET
      path: "/conversations"
  noisy_broadcast:
    http:
      method: POST
      path: "/messages"
    on_success:
      broadcast:
        topic: chat
        payload_template: "{{not_supplied}}"
  flaky:
    http:
      method: GET
      path: "/fail/{{id}}"
  plain_text:
    http:
      method: GET
      path: "/text"
"#
    )
}
