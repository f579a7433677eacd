//! Tool-call dispatch: validate, resolve, forward, then maybe broadcast.
//!
//! [`Dispatcher::plan`] does every check that can fail without I/O and returns
//! the exact backend request; [`Dispatcher::dispatch`] sends it. Nothing goes
//! over the network until planning has succeeded.

use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use super::config::{BroadcastRule, ConfigurationError, GatewayConfig, HttpMethod};
use super::events::{EventPublisher, GatewayEvent};
use super::template::stringify;

/// Inbound `POST /call` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Tool '{0}' not found")]
    UnknownTool(String),

    #[error("Missing parameter '{param}' for tool '{tool}'")]
    MissingParameter { tool: String, param: String },

    #[error("Invalid tool call: {0}")]
    InvalidRequest(String),

    #[error("Parameters for tool '{tool}' resolve to a relative path segment in {path:?}")]
    DotSegment { tool: String, path: String },

    #[error("Resolved URL for tool '{tool}' is invalid: {source}")]
    InvalidUrl {
        tool: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Backend returned HTTP {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("Backend request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Backend response is not valid JSON: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnknownTool(_) => StatusCode::NOT_FOUND,
            Self::InvalidRequest(_)
            | Self::MissingParameter { .. }
            | Self::DotSegment { .. }
            | Self::InvalidUrl { .. } => StatusCode::BAD_REQUEST,
            Self::Backend { .. } | Self::Transport(_) | Self::MalformedResponse(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(serde_json::json!({ "detail": self.to_string() })),
        )
            .into_response()
    }
}

/// A fully resolved backend call.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendRequest {
    pub method: HttpMethod,
    pub url: Url,
    /// JSON body for `POST`; `None` for `GET`.
    pub body: Option<Value>,
}

/// What happened to the success broadcast of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// Publishing is off for this gateway, or the tool has no rule.
    NotConfigured,
    Published,
    /// Payload template could not be rendered; nothing was sent.
    Skipped(String),
    Failed(String),
}

pub struct Dispatcher {
    config: Arc<GatewayConfig>,
    client: reqwest::Client,
    events: Option<Arc<dyn EventPublisher>>,
}

impl Dispatcher {
    /// `events` is ignored unless the config enables publishing.
    pub fn new(
        config: Arc<GatewayConfig>,
        events: Option<Arc<dyn EventPublisher>>,
    ) -> Result<Self, ConfigurationError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ConfigurationError::Invalid(format!("HTTP client: {e}")))?;
        let events = events.filter(|_| config.events_enabled());
        Ok(Self {
            config,
            client,
            events,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Resolve `request` into a backend call without touching the network.
    ///
    /// Path values are percent-encoded into their segment. A value that still
    /// renders as a `.` or `..` segment is refused, since URL parsing would
    /// otherwise walk the path to a different backend route.
    ///
    /// `GET` forwards every parameter as a query pair, in request order, even
    /// the ones the path template already consumed.
    pub fn plan(&self, request: &ToolCallRequest) -> Result<BackendRequest, DispatchError> {
        let tool = self
            .config
            .tool(&request.tool)
            .ok_or_else(|| DispatchError::UnknownTool(request.tool.clone()))?;

        let path = tool.http.path.render_path(&request.params).map_err(|missing| {
            DispatchError::MissingParameter {
                tool: request.tool.clone(),
                param: missing.0,
            }
        })?;
        if path.split('/').any(is_dot_segment) {
            return Err(DispatchError::DotSegment {
                tool: request.tool.clone(),
                path,
            });
        }

        let mut url = Url::parse(&format!("{}{}", self.config.meta.backend_base_url, path))
            .map_err(|source| DispatchError::InvalidUrl {
                tool: request.tool.clone(),
                source,
            })?;

        let body = match tool.http.method {
            HttpMethod::Get => {
                if !request.params.is_empty() {
                    let mut pairs = url.query_pairs_mut();
                    for (name, value) in &request.params {
                        pairs.append_pair(name, &stringify(value));
                    }
                }
                None
            }
            HttpMethod::Post => Some(Value::Object(request.params.clone())),
        };

        Ok(BackendRequest {
            method: tool.http.method,
            url,
            body,
        })
    }

    /// Forward `request` to the backend and return its parsed JSON body.
    ///
    /// A configured success broadcast runs only after the backend result is
    /// final; its failures are logged and never change the returned value.
    pub async fn dispatch(&self, request: &ToolCallRequest) -> Result<Value, DispatchError> {
        let planned = self.plan(request)?;
        let started = Instant::now();

        let builder = match planned.method {
            HttpMethod::Get => self.client.get(planned.url.clone()),
            HttpMethod::Post => self
                .client
                .post(planned.url.clone())
                .json(planned.body.as_ref().unwrap_or(&Value::Null)),
        };

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(tool = %request.tool, url = %planned.url, error = %e, "backend unreachable");
            DispatchError::Transport(e)
        })?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::warn!(
                tool = %request.tool,
                method = %planned.method,
                url = %planned.url,
                status = status.as_u16(),
                "backend call failed"
            );
            return Err(DispatchError::Backend {
                status: status.as_u16(),
                body: text,
            });
        }

        let result: Value = serde_json::from_str(&text)?;

        let broadcast = self.broadcast(request).await;

        tracing::info!(
            tool = %request.tool,
            method = %planned.method,
            url = %planned.url,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            broadcast = ?broadcast,
            "tool call dispatched"
        );

        Ok(result)
    }

    async fn broadcast(&self, request: &ToolCallRequest) -> BroadcastOutcome {
        let Some(events) = &self.events else {
            return BroadcastOutcome::NotConfigured;
        };
        let Some(rule) = self.config.tool(&request.tool).and_then(|t| t.broadcast()) else {
            return BroadcastOutcome::NotConfigured;
        };

        let outcome = self.publish(events.as_ref(), rule, &request.params).await;
        match &outcome {
            BroadcastOutcome::Skipped(reason) | BroadcastOutcome::Failed(reason) => {
                tracing::warn!(tool = %request.tool, topic = %rule.topic, reason = %reason, "broadcast dropped");
            }
            _ => {}
        }
        outcome
    }

    async fn publish(
        &self,
        events: &dyn EventPublisher,
        rule: &BroadcastRule,
        params: &Map<String, Value>,
    ) -> BroadcastOutcome {
        let payload = match rule.payload_template.render(params) {
            Ok(p) => p,
            Err(missing) => return BroadcastOutcome::Skipped(missing.to_string()),
        };

        let event = GatewayEvent {
            topic: rule.topic.clone(),
            payload,
        };
        let timeout = self.config.broadcast_timeout();
        match tokio::time::timeout(timeout, events.publish(event)).await {
            Ok(Ok(())) => BroadcastOutcome::Published,
            Ok(Err(e)) => BroadcastOutcome::Failed(e.to_string()),
            Err(_) => BroadcastOutcome::Failed(format!("timed out after {timeout:?}")),
        }
    }
}

/// `.` and `..`, including the `%2e` spellings URL parsing also resolves.
fn is_dot_segment(segment: &str) -> bool {
    matches!(
        segment.to_ascii_lowercase().as_str(),
        "." | "%2e" | ".." | ".%2e" | "%2e." | "%2e%2e"
    )
}
