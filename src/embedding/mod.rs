//! Text-to-vector embedding providers.
//!
//! [`EmbeddingProvider`] is implemented by an OpenAI-compatible HTTP client
//! and by a deterministic local hashing embedder. [`create_provider`] picks one
//! from configuration; `None` means embeddings are disabled.

pub mod hashed;
pub mod openai;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::EmbeddingConfig;

/// Produces a vector embedding for a piece of text.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Identifier stored next to each vector so mismatched models can be spotted.
    fn model_name(&self) -> &str;

    fn dimensions(&self) -> usize;
}

/// Build the configured provider.
///
/// `"openai"` needs `OPENAI_API_KEY`; when it is missing the background task is
/// disabled rather than failing startup.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Option<Box<dyn EmbeddingProvider>>> {
    match config.provider.as_str() {
        "none" => Ok(None),
        "hashed" => Ok(Some(Box::new(hashed::HashedEmbedder::new(config.dimensions)))),
        "openai" => match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.is_empty() => {
                Ok(Some(Box::new(openai::OpenAiEmbedder::new(key, config)?)))
            }
            _ => {
                tracing::warn!("OPENAI_API_KEY not set, message embeddings disabled");
                Ok(None)
            }
        },
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: openai, hashed, none"),
    }
}
