use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use super::{IndexEntry, IndexHandle, IndexHeader, VectorIndex, persist};
use crate::embeddings::Embedder;
use crate::knowledge::{KnowledgeExtractor, KnowledgeSource};
use crate::{ChatError, Result};

/// Outcome of a completed rebuild
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub documents: usize,
    pub embedding_model: String,
    pub built_at: DateTime<Utc>,
    /// False when the index could not be written to disk and lives only in memory
    pub persisted: bool,
}

/// Failure shared with every caller that joined a rebuild
#[derive(Debug, Clone)]
enum RebuildFailure {
    DatabaseUnavailable(String),
    UpstreamUnavailable(String),
    Config(String),
    Other(String),
}

impl From<ChatError> for RebuildFailure {
    fn from(error: ChatError) -> Self {
        match error {
            ChatError::DatabaseUnavailable(message) => Self::DatabaseUnavailable(message),
            ChatError::UpstreamUnavailable(message) => Self::UpstreamUnavailable(message),
            ChatError::Config(message) => Self::Config(message),
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<RebuildFailure> for ChatError {
    fn from(failure: RebuildFailure) -> Self {
        match failure {
            RebuildFailure::DatabaseUnavailable(message) => Self::DatabaseUnavailable(message),
            RebuildFailure::UpstreamUnavailable(message) => Self::UpstreamUnavailable(message),
            RebuildFailure::Config(message) => Self::Config(message),
            RebuildFailure::Other(message) => Self::RebuildFailed(message),
        }
    }
}

type RebuildOutcome = std::result::Result<RebuildReport, RebuildFailure>;

/// Owns the served index and knows how to rebuild it from the storefront
pub struct KnowledgeBase {
    handle: Arc<IndexHandle>,
    extractor: KnowledgeExtractor,
    source: Arc<dyn KnowledgeSource>,
    embedder: Arc<dyn Embedder>,
    index_path: PathBuf,
    in_flight: Mutex<Option<broadcast::Sender<RebuildOutcome>>>,
}

impl KnowledgeBase {
    #[inline]
    pub fn new(
        extractor: KnowledgeExtractor,
        source: Arc<dyn KnowledgeSource>,
        embedder: Arc<dyn Embedder>,
        index_path: PathBuf,
    ) -> Self {
        Self {
            handle: Arc::new(IndexHandle::new()),
            extractor,
            source,
            embedder,
            index_path,
            in_flight: Mutex::new(None),
        }
    }

    #[inline]
    pub fn handle(&self) -> Arc<IndexHandle> {
        Arc::clone(&self.handle)
    }

    #[inline]
    pub fn embedder(&self) -> Arc<dyn Embedder> {
        Arc::clone(&self.embedder)
    }

    #[inline]
    pub fn index_path(&self) -> &std::path::Path {
        &self.index_path
    }

    /// Header of the index currently served, if any
    #[inline]
    pub async fn current_header(&self) -> Option<IndexHeader> {
        self.handle
            .snapshot()
            .await
            .map(|index| index.header().clone())
    }

    /// Serve the persisted index if there is one. A model mismatch is an error.
    #[inline]
    pub async fn load_persisted(&self) -> Result<Option<IndexHeader>> {
        let path = self.index_path.clone();
        let loaded = tokio::task::spawn_blocking(move || persist::load(&path))
            .await
            .map_err(|e| ChatError::Index(format!("index load task failed: {e}")))??;

        let Some(index) = loaded else {
            return Ok(None);
        };

        persist::validate_model(index.header(), self.embedder.model_id())?;
        let header = index.header().clone();
        self.handle.swap(index).await;
        Ok(Some(header))
    }

    /// Rebuild the index from the source. Concurrent callers share one rebuild
    /// and all receive its outcome; the rebuild finishes even if a caller goes away.
    #[inline]
    pub async fn refresh(self: &Arc<Self>) -> Result<RebuildReport> {
        let mut receiver = {
            let mut slot = self.in_flight.lock().await;
            if let Some(sender) = slot.as_ref() {
                debug!("Rebuild already running, waiting for its result");
                sender.subscribe()
            } else {
                let (sender, receiver) = broadcast::channel(1);
                *slot = Some(sender);

                let knowledge_base = Arc::clone(self);
                tokio::spawn(async move {
                    let worker = Arc::clone(&knowledge_base);
                    let outcome = match tokio::spawn(async move { worker.rebuild().await }).await
                    {
                        Ok(result) => result.map_err(RebuildFailure::from),
                        Err(e) => Err(RebuildFailure::Other(format!("rebuild task failed: {e}"))),
                    };

                    let sender = knowledge_base.in_flight.lock().await.take();
                    if let Some(sender) = sender {
                        let _ = sender.send(outcome);
                    }
                });
                receiver
            }
        };

        match receiver.recv().await {
            Ok(outcome) => outcome.map_err(ChatError::from),
            Err(e) => Err(ChatError::RebuildFailed(format!(
                "rebuild finished without reporting: {e}"
            ))),
        }
    }

    async fn rebuild(&self) -> Result<RebuildReport> {
        info!("Rebuilding knowledge index");

        let documents = self.extractor.extract(self.source.as_ref()).await?;
        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();

        let embedder = Arc::clone(&self.embedder);
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            tokio::task::spawn_blocking(move || embedder.embed(&texts))
                .await
                .map_err(|e| ChatError::RebuildFailed(format!("embedding task failed: {e}")))?
                .map_err(|e| ChatError::UpstreamUnavailable(format!("{e:#}")))?
        };

        if vectors.len() != documents.len() {
            return Err(ChatError::Index(format!(
                "received {} embeddings for {} documents",
                vectors.len(),
                documents.len()
            )));
        }

        let entries = vectors
            .into_iter()
            .zip(documents)
            .map(|(vector, document)| IndexEntry { vector, document })
            .collect();
        let index = VectorIndex::build(self.embedder.model_id(), entries)?;
        let header = index.header().clone();

        let path = self.index_path.clone();
        let persisted = match tokio::task::spawn_blocking(move || {
            let outcome = persist::save(&index, &path);
            (index, outcome)
        })
        .await
        {
            Ok((index, outcome)) => {
                let persisted = match outcome {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(
                            "Failed to persist index to {}: {}",
                            self.index_path.display(),
                            e
                        );
                        false
                    }
                };
                self.handle.swap(index).await;
                persisted
            }
            Err(e) => {
                return Err(ChatError::RebuildFailed(format!(
                    "index persist task failed: {e}"
                )));
            }
        };

        info!(
            "Index rebuilt with {} documents (persisted: {})",
            header.document_count, persisted
        );

        Ok(RebuildReport {
            documents: header.document_count,
            embedding_model: header.embedding_model,
            built_at: header.built_at,
            persisted,
        })
    }
}

impl std::fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("embedding_model", &self.embedder.model_id())
            .field("index_path", &self.index_path)
            .finish_non_exhaustive()
    }
}
