//! Process configuration: TOML file plus environment overrides.
//!
//! The gateway's tool map lives in its own YAML file (see
//! [`crate::gateway::config`]); this module only knows where to find it.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub gateway: GatewaySettings,
}

/// Graph Memory API listener.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `"openai"`, `"hashed"`, or `"none"`.
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub dimensions: usize,
    pub request_timeout_secs: u64,
    /// Pending jobs beyond this are dropped.
    pub queue_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GatewaySettings {
    pub host: String,
    pub port: u16,
    /// YAML tool map.
    pub tools_path: String,
    /// Where success broadcasts go. `None` keeps them in-process (`/ws`).
    pub events_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_data_dir()
            .join("graph.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model: "text-embedding-3-small".into(),
            base_url: "https://api.openai.com/v1".into(),
            dimensions: 1536,
            request_timeout_secs: 30,
            queue_capacity: 1024,
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3911,
            tools_path: "gateway.yaml".into(),
            events_url: None,
        }
    }
}

/// Returns `~/.graph-memory/`, or `./.graph-memory/` when there is no home directory.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".graph-memory")
}

/// Returns the default config file path: `~/.graph-memory/config.toml`
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}

impl AppConfig {
    /// Load config from the default TOML file (if it exists) then apply env overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            AppConfig::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from `lookup`:
    /// `PORT`, `GATEWAY_CONFIG`, `GATEWAY_EVENTS_URL`,
    /// `GRAPH_MEMORY_API_PORT`, `GRAPH_MEMORY_DB`, `GRAPH_MEMORY_LOG_LEVEL`.
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(val) = lookup("PORT") {
            self.gateway.port = val
                .parse()
                .with_context(|| format!("PORT is not a valid port: {val}"))?;
        }
        if let Some(val) = lookup("GATEWAY_CONFIG") {
            self.gateway.tools_path = val;
        }
        if let Some(val) = lookup("GATEWAY_EVENTS_URL") {
            self.gateway.events_url = Some(val).filter(|v| !v.is_empty());
        }
        if let Some(val) = lookup("GRAPH_MEMORY_API_PORT") {
            self.server.port = val
                .parse()
                .with_context(|| format!("GRAPH_MEMORY_API_PORT is not a valid port: {val}"))?;
        }
        if let Some(val) = lookup("GRAPH_MEMORY_DB") {
            self.storage.db_path = val;
        }
        if let Some(val) = lookup("GRAPH_MEMORY_LOG_LEVEL") {
            self.server.log_level = val;
        }
        Ok(())
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
