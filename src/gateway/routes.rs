//! Gateway HTTP surface: `POST /call`, `GET /health`, and `GET /ws`.

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::HeaderValue;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::dispatch::{DispatchError, Dispatcher, ToolCallRequest};
use super::events::EventHub;

#[derive(Clone)]
pub struct GatewayState {
    dispatcher: Arc<Dispatcher>,
    /// Present when events are fanned out in-process; enables `/ws`.
    hub: Option<Arc<EventHub>>,
}

impl GatewayState {
    pub fn new(dispatcher: Arc<Dispatcher>, hub: Option<Arc<EventHub>>) -> Self {
        Self { dispatcher, hub }
    }
}

pub fn router(state: GatewayState) -> Router {
    let cors = cors_layer(&state.dispatcher.config().meta.cors_allowed_origins);

    let mut router = Router::new()
        .route("/call", post(call_tool))
        .route("/health", get(health));
    if state.hub.is_some() {
        router = router.route("/ws", get(ws_handler));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(allowed))
}

async fn call_tool(
    State(state): State<GatewayState>,
    payload: Result<Json<ToolCallRequest>, JsonRejection>,
) -> Result<Json<Value>, DispatchError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "malformed tool call");
        DispatchError::InvalidRequest(rejection.body_text())
    })?;
    tracing::debug!(tool = %request.tool, params = request.params.len(), "tool call received");
    let result = state.dispatcher.dispatch(&request).await?;
    Ok(Json(result))
}

async fn health(State(state): State<GatewayState>) -> Json<Value> {
    let meta = &state.dispatcher.config().meta;
    Json(json!({
        "status": "healthy",
        "service": meta.gateway_name,
        "backend_url": meta.backend_base_url,
    }))
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    topic: Option<String>,
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
    Query(query): Query<WsQuery>,
) -> impl IntoResponse {
    let rx = state.hub.as_ref().map(|hub| hub.subscribe());
    ws.on_upgrade(move |socket| async move {
        if let Some(rx) = rx {
            forward_events(socket, rx, query.topic).await;
        }
    })
}

/// Push hub events to one client until either side goes away.
async fn forward_events(
    socket: WebSocket,
    mut rx: broadcast::Receiver<super::events::GatewayEvent>,
    topic: Option<String>,
) {
    let (mut sender, mut receiver) = socket.split();
    tracing::debug!(topic = ?topic, "websocket subscriber connected");

    let mut send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if topic.as_deref().is_some_and(|t| t != event.topic) {
                        continue;
                    }
                    let Ok(text) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sender.send(WsMessage::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "websocket subscriber lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(msg, WsMessage::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    tracing::debug!("websocket subscriber disconnected");
}
