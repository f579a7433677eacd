//! Graph Memory API: HTTP routes over the conversation graph.
//!
//! All SQLite work is pushed onto the blocking pool through [`AppState::with_db`].

pub mod error;

use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::{GraphError, GraphResult};
use crate::graph::types::{Conversation, ConversationCreate, GraphData, Message, MessageCreate};
use crate::graph::{conversations, search, seed, traversal};
use crate::tasks::EmbeddingQueue;
use error::ApiError;

pub const SERVICE_NAME: &str = "Graph Memory API";

#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Connection>>,
    embeddings: Option<EmbeddingQueue>,
}

impl AppState {
    pub fn new(db: Arc<Mutex<Connection>>, embeddings: Option<EmbeddingQueue>) -> Self {
        Self { db, embeddings }
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_db<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> GraphResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = db.lock().map_err(|_| GraphError::LockPoisoned)?;
            f(&mut *conn)
        })
        .await??;
        Ok(result)
    }
}

/// Build the API router. CORS is wide open, matching the browser-facing
/// graph viewer this API serves.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/seed", post(seed_data))
        .route("/conversations", get(list_conversations).post(create_conversation))
        .route("/conversations/{id}/messages", get(conversation_messages))
        .route("/messages", post(add_message))
        .route("/nodes/{id}/children", get(children))
        .route("/nodes/{id}/similar", get(similar))
        .route("/search", get(search_messages))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": SERVICE_NAME }))
}

async fn seed_data(State(state): State<AppState>) -> Result<Json<seed::SeedResult>, ApiError> {
    let result = state.with_db(|conn| seed::seed_sample_data(conn)).await?;
    Ok(Json(result))
}

async fn create_conversation(
    State(state): State<AppState>,
    Json(payload): Json<ConversationCreate>,
) -> Result<Json<String>, ApiError> {
    let id = state
        .with_db(move |conn| conversations::create_conversation(conn, &payload.title))
        .await?;
    tracing::info!(conversation_id = %id, "conversation created");
    Ok(Json(id))
}

async fn list_conversations(
    State(state): State<AppState>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let convs = state
        .with_db(|conn| conversations::list_conversations(conn))
        .await?;
    Ok(Json(convs))
}

async fn conversation_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let lookup = id.clone();
    let messages = state
        .with_db(move |conn| conversations::conversation_messages(conn, &lookup))
        .await?
        .ok_or(GraphError::ConversationNotFound(id))?;
    Ok(Json(messages))
}

async fn add_message(
    State(state): State<AppState>,
    Json(payload): Json<MessageCreate>,
) -> Result<Json<String>, ApiError> {
    let MessageCreate {
        conversation_id,
        role,
        text,
    } = payload;
    let text_for_embedding = text.clone();
    let conv = conversation_id.clone();
    let id = state
        .with_db(move |conn| conversations::add_message(conn, &conv, &role, &text))
        .await?;

    tracing::info!(message_id = %id, conversation_id = %conversation_id, "message added");

    if let Some(queue) = &state.embeddings {
        queue.enqueue(id.clone(), text_for_embedding);
    }

    Ok(Json(id))
}

#[derive(Debug, Deserialize)]
struct ChildrenQuery {
    #[serde(default = "default_depth")]
    depth: u32,
}

fn default_depth() -> u32 {
    1
}

async fn children(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<ChildrenQuery>,
) -> Result<Json<GraphData>, ApiError> {
    let graph = state
        .with_db(move |conn| traversal::children(conn, &id, q.depth))
        .await?;
    Ok(Json(graph))
}

#[derive(Debug, Deserialize)]
struct SimilarQuery {
    #[serde(default = "default_k")]
    k: usize,
}

fn default_k() -> usize {
    5
}

async fn similar(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<SimilarQuery>,
) -> Result<Json<GraphData>, ApiError> {
    let graph = state
        .with_db(move |conn| search::similar_nodes(conn, &id, q.k))
        .await?;
    Ok(Json(graph))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: String,
    #[serde(default = "default_k")]
    k: usize,
}

async fn search_messages(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<GraphData>, ApiError> {
    let graph = state
        .with_db(move |conn| search::search_graph(conn, &params.q, params.k))
        .await?;
    Ok(Json(graph))
}
