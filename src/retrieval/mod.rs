#[cfg(test)]
mod tests;

use std::sync::Arc;
use tracing::debug;

use crate::embeddings::Embedder;
use crate::index::{IndexHandle, ScoredDocument};
use crate::{ChatError, Result};

/// Embeds a question and looks it up in the served index
#[derive(Clone)]
pub struct Retriever {
    handle: Arc<IndexHandle>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl Retriever {
    #[inline]
    pub fn new(handle: Arc<IndexHandle>, embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        Self {
            handle,
            embedder,
            top_k: top_k.max(1),
        }
    }

    /// Up to `top_k` documents ranked by ascending distance.
    ///
    /// An empty or unbuilt index yields an empty list without calling the
    /// embedding service.
    #[inline]
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredDocument>> {
        let Some(index) = self.handle.snapshot().await else {
            debug!("Index not initialized, skipping retrieval");
            return Ok(Vec::new());
        };
        if index.is_empty() {
            return Ok(Vec::new());
        }

        let embedder = Arc::clone(&self.embedder);
        let texts = vec![query.to_string()];
        let mut vectors = tokio::task::spawn_blocking(move || embedder.embed(&texts))
            .await
            .map_err(|e| ChatError::Other(anyhow::anyhow!("embedding task failed: {e}")))?
            .map_err(|e| ChatError::UpstreamUnavailable(format!("{e:#}")))?;

        let query_vector = vectors.pop().ok_or_else(|| {
            ChatError::UpstreamUnavailable("embedding service returned no vector".to_string())
        })?;

        let results = index.search(&query_vector, self.top_k)?;
        debug!(
            "Retrieved {} documents (best distance {:?})",
            results.len(),
            results.first().map(|r| r.distance)
        );
        Ok(results)
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedding_model", &self.embedder.model_id())
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}
