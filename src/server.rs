//! Process bootstrap for the Graph Memory API and the tool-call gateway.
//!
//! [`serve_api`] wires the database, embedding worker, and API router;
//! [`serve_gateway`] wires the tool map, event channel, and gateway router.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

use crate::api::{self, AppState};
use crate::config::{AppConfig, GatewaySettings};
use crate::db;
use crate::embedding;
use crate::gateway::events::{EventHub, EventPublisher, HttpRelay};
use crate::gateway::routes::{self, GatewayState};
use crate::gateway::{Dispatcher, GatewayConfig};
use crate::tasks;

/// Open the graph store and start the embedding worker, if one is configured.
pub fn build_api_state(config: &AppConfig) -> Result<AppState> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database ready");
    let db = Arc::new(Mutex::new(conn));

    let queue = match embedding::create_provider(&config.embedding)? {
        Some(provider) => {
            let provider: Arc<dyn embedding::EmbeddingProvider> = Arc::from(provider);
            let (queue, _worker) = tasks::spawn_embedding_worker(
                Arc::clone(&db),
                provider,
                config.embedding.queue_capacity,
            );
            Some(queue)
        }
        None => {
            tracing::info!("embedding worker disabled");
            None
        }
    };

    Ok(AppState::new(db, queue))
}

/// Serve the Graph Memory API until ctrl-c.
pub async fn serve_api(config: AppConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = build_api_state(&config)?;
    let router = api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "Graph Memory API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal("api"))
        .await?;
    Ok(())
}

/// Choose the event channel: an HTTP relay when `events_url` is set, otherwise
/// the in-process hub. Returns the hub separately so `/ws` can subscribe to it.
pub fn build_gateway_state(
    config: Arc<GatewayConfig>,
    settings: &GatewaySettings,
) -> Result<GatewayState> {
    let (publisher, hub): (Option<Arc<dyn EventPublisher>>, Option<Arc<EventHub>>) =
        if !config.events_enabled() {
            (None, None)
        } else if let Some(url) = &settings.events_url {
            let relay = HttpRelay::new(url.clone(), config.broadcast_timeout())
                .context("failed to build event relay client")?;
            tracing::info!(url = %url, "success broadcasts relayed over HTTP");
            (Some(Arc::new(relay)), None)
        } else {
            let hub = Arc::new(EventHub::default());
            tracing::info!("success broadcasts served on /ws");
            (Some(hub.clone() as Arc<dyn EventPublisher>), Some(hub))
        };

    let dispatcher = Dispatcher::new(config, publisher)?;
    Ok(GatewayState::new(Arc::new(dispatcher), hub))
}

/// Serve the gateway until ctrl-c.
pub async fn serve_gateway(config: GatewayConfig, settings: GatewaySettings) -> Result<()> {
    let bind_addr = format!("{}:{}", settings.host, settings.port);
    let config = Arc::new(config);
    tracing::info!(
        gateway = %config.meta.gateway_name,
        backend = %config.meta.backend_base_url,
        tools = config.tools.len(),
        "starting tool-call gateway"
    );

    let state = build_gateway_state(config, &settings)?;
    let router = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal("gateway"))
        .await?;
    Ok(())
}

async fn shutdown_signal(name: &'static str) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!(server = name, "shutting down");
}
