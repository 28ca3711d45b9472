
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use super::Embedder;
use crate::config::EmbeddingConfig;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u32 = 2;

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    batch_size: u32,
    agent: ureq::Agent,
    retry_attempts: u32,
    backoff: Duration,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = config
            .base_url()
            .context("Failed to generate Ollama URL from config")?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            base_url,
            model: config.model.clone(),
            batch_size: config.batch_size.max(1),
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff: Duration::from_secs(1),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Base delay before the first retry; doubles on each further attempt
    #[inline]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The server answers `/api/tags` and lists the configured model
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        self.validate_model()
            .with_context(|| format!("Ollama at {} is not ready", self.base_url))?;
        info!("Ollama at {} serves {}", self.base_url, self.model);
        Ok(())
    }

    /// The configured model has been pulled, with or without the `:latest` tag
    #[inline]
    pub fn validate_model(&self) -> Result<()> {
        let models = self.list_models()?;
        let tagged = format!("{}:latest", self.model);

        if models.iter().any(|m| m.name == self.model || m.name == tagged) {
            return Ok(());
        }

        let available: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
        warn!("Embedding model {} missing from Ollama", self.model);
        anyhow::bail!(
            "model '{}' is not pulled (available: {})",
            self.model,
            available.join(", ")
        )
    }

    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("/api/tags")?;
        let body = self
            .with_retries(|| {
                self.agent
                    .get(url.as_str())
                    .call()
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to list Ollama models")?;

        let tags: ModelsResponse =
            serde_json::from_str(&body).context("Unexpected /api/tags response")?;
        debug!("Ollama lists {} models", tags.models.len());
        Ok(tags.models)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Invalid Ollama endpoint {path}"))
    }

    /// Embed texts in batches of `batch_size`, preserving input order
    #[inline]
    pub fn generate_embeddings_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size as usize) {
            results.extend(
                self.embed_batch(chunk)
                    .with_context(|| format!("Failed to embed a batch of {} texts", chunk.len()))?,
            );
        }

        debug!("Embedded {} texts with {}", results.len(), self.model);
        Ok(results)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = self.endpoint("/api/embed")?;
        let body = serde_json::to_string(&EmbedRequest {
            model: &self.model,
            input: texts,
        })?;

        let reply = self.with_retries(|| {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&body)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let EmbedResponse { embeddings } =
            serde_json::from_str(&reply).context("Unexpected /api/embed response")?;
        if embeddings.len() != texts.len() {
            anyhow::bail!(
                "asked for {} embeddings, Ollama returned {}",
                texts.len(),
                embeddings.len()
            );
        }
        Ok(embeddings)
    }

    /// Run `call` until it succeeds, a non-transient error occurs or the
    /// attempts run out. 429, 5xx and transport failures are transient.
    fn with_retries<F>(&self, mut call: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut attempt = 1;
        loop {
            let error = match call() {
                Ok(body) => return Ok(body),
                Err(error) => error,
            };

            let transient = match &error {
                ureq::Error::StatusCode(status) => *status == 429 || *status >= 500,
                ureq::Error::ConnectionFailed
                | ureq::Error::HostNotFound
                | ureq::Error::Timeout(_)
                | ureq::Error::Io(_) => true,
                _ => false,
            };
            let message = match &error {
                ureq::Error::StatusCode(status) => format!("HTTP {status}"),
                other => other.to_string(),
            };

            if !transient {
                anyhow::bail!("Ollama request rejected: {message}");
            }
            if attempt >= self.retry_attempts {
                error!(
                    "Ollama at {} still failing after {} attempts: {}",
                    self.base_url, attempt, message
                );
                anyhow::bail!("Ollama unavailable after {attempt} attempts: {message}");
            }

            let factor = EXPONENTIAL_BACKOFF_BASE
                .checked_pow(attempt - 1)
                .unwrap_or(u32::MAX);
            let delay = self.backoff.saturating_mul(factor);
            warn!(
                "Ollama request failed ({}), retry {}/{} in {:?}",
                message, attempt, self.retry_attempts, delay
            );
            std::thread::sleep(delay);
            attempt += 1;
        }
    }
}

impl Embedder for OllamaClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.generate_embeddings_batch(texts)
    }
}
