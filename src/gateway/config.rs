//! Declarative tool map, loaded once from YAML at startup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use super::template::Template;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("failed to read gateway config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed gateway config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid gateway config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub meta: GatewayMeta,
    #[serde(default)]
    pub middleware: MiddlewareConfig,
    pub tools: BTreeMap<String, ToolDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayMeta {
    pub gateway_name: String,
    /// Absolute URL, stored without a trailing slash.
    pub backend_base_url: String,
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
    #[serde(default)]
    pub websockets: WebsocketsConfig,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_broadcast_timeout_ms")]
    pub broadcast_timeout_ms: u64,
}

/// Success broadcasts are published only when this is enabled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebsocketsConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MiddlewareConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum HttpMethod {
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "POST")]
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolDefinition {
    pub http: HttpBinding,
    #[serde(default)]
    pub on_success: Option<OnSuccess>,
}

impl ToolDefinition {
    pub fn broadcast(&self) -> Option<&BroadcastRule> {
        self.on_success.as_ref().and_then(|s| s.broadcast.as_ref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpBinding {
    pub method: HttpMethod,
    pub path: Template,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OnSuccess {
    #[serde(default)]
    pub broadcast: Option<BroadcastRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastRule {
    pub topic: String,
    pub payload_template: Template,
}

fn default_request_timeout_secs() -> u64 {
    5
}

fn default_broadcast_timeout_ms() -> u64 {
    500
}

fn default_log_level() -> String {
    "info".into()
}

impl GatewayConfig {
    /// Read and validate a YAML tool map.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&contents)?;
        tracing::info!(
            path = %path.display(),
            gateway = %config.meta.gateway_name,
            tools = config.tools.len(),
            "gateway config loaded"
        );
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigurationError> {
        let mut config: GatewayConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&mut self) -> Result<(), ConfigurationError> {
        if self.meta.gateway_name.trim().is_empty() {
            return Err(ConfigurationError::Invalid(
                "meta.gateway_name must not be empty".into(),
            ));
        }

        let base = self.meta.backend_base_url.trim_end_matches('/').to_string();
        let parsed = url::Url::parse(&base).map_err(|e| {
            ConfigurationError::Invalid(format!(
                "meta.backend_base_url {base:?} is not an absolute URL: {e}"
            ))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigurationError::Invalid(format!(
                "meta.backend_base_url must use http or https, got {}",
                parsed.scheme()
            )));
        }
        self.meta.backend_base_url = base;

        for (name, tool) in &self.tools {
            if !tool.http.path.as_str().starts_with('/') {
                return Err(ConfigurationError::Invalid(format!(
                    "tools.{name}.http.path must start with '/', got {:?}",
                    tool.http.path.as_str()
                )));
            }
            if let Some(rule) = tool.broadcast() {
                if rule.topic.is_empty() {
                    return Err(ConfigurationError::Invalid(format!(
                        "tools.{name}.on_success.broadcast.topic must not be empty"
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn tool(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    pub fn events_enabled(&self) -> bool {
        self.meta.websockets.enabled
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.meta.request_timeout_secs)
    }

    pub fn broadcast_timeout(&self) -> Duration {
        Duration::from_millis(self.meta.broadcast_timeout_ms)
    }
}
