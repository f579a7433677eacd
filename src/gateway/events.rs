//! Event channel for success broadcasts.
//!
//! [`EventHub`] fans events out in-process to WebSocket subscribers;
//! [`HttpRelay`] forwards them to an external endpoint. Both sit behind
//! [`EventPublisher`] so the dispatcher does not care which one is configured.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayEvent {
    pub topic: String,
    pub payload: String,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("event relay request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("event relay returned HTTP {0}")]
    Status(u16),
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: GatewayEvent) -> Result<(), PublishError>;
}

/// In-process broadcast channel. Slow subscribers lag and lose old events
/// rather than blocking publishers.
pub struct EventHub {
    tx: broadcast::Sender<GatewayEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl EventPublisher for EventHub {
    async fn publish(&self, event: GatewayEvent) -> Result<(), PublishError> {
        // No subscribers is not a failure: the event simply has no audience.
        let delivered = self.tx.send(event).unwrap_or(0);
        tracing::debug!(subscribers = delivered, "event published to hub");
        Ok(())
    }
}

/// Relays each event as `POST {url}` with a `{topic, payload}` JSON body.
pub struct HttpRelay {
    client: reqwest::Client,
    url: String,
}

impl HttpRelay {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl EventPublisher for HttpRelay {
    async fn publish(&self, event: GatewayEvent) -> Result<(), PublishError> {
        let response = self.client.post(&self.url).json(&event).send().await?;
        if !response.status().is_success() {
            return Err(PublishError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}
