// Sentence embeddings: the Ollama HTTP client and an offline hashing embedder

pub mod hashing;
pub mod ollama;

use anyhow::Result;
use std::sync::Arc;

use crate::config::{Config, EmbeddingProvider};

pub use hashing::HashingEmbedder;
pub use ollama::OllamaClient;

/// Turns texts into vectors. Implementations block; async callers go through `spawn_blocking`.
pub trait Embedder: Send + Sync {
    /// Identifier recorded in the persisted index header
    fn model_id(&self) -> &str;

    /// One vector per input text, in input order
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Build the embedder selected by `[embedding].provider`
#[inline]
pub fn from_config(config: &Config) -> Result<Arc<dyn Embedder>> {
    match config.embedding.provider {
        EmbeddingProvider::Ollama => Ok(Arc::new(OllamaClient::new(&config.embedding)?)),
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbedder::new(
            config.embedding.embedding_dimension as usize,
        ))),
    }
}
