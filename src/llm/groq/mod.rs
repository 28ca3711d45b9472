
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

use super::{ChatMessage, CompletionRequest, LlmError, LlmProvider};
use crate::config::LlmConfig;

const EXPONENTIAL_BACKOFF_BASE: u32 = 2;

/// Client for an OpenAI-compatible `/chat/completions` endpoint (Groq by default)
#[derive(Debug, Clone)]
pub struct GroqClient {
    completions_url: Url,
    model: String,
    api_key: String,
    agent: ureq::Agent,
    retry_attempts: u32,
    backoff: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

enum Attempt {
    Retry(String),
    Fail(LlmError),
}

impl GroqClient {
    #[inline]
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> anyhow::Result<Self> {
        let completions_url = config
            .completions_url()
            .context("Failed to build completions URL from config")?;

        Ok(Self {
            completions_url,
            model: config.model.clone(),
            api_key: api_key.into(),
            agent: build_agent(Duration::from_secs(config.timeout_secs.max(1))),
            retry_attempts: config.retry_attempts.max(1),
            backoff: Duration::from_millis(500),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
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
    pub fn completions_url(&self) -> &Url {
        &self.completions_url
    }

    /// Delay after failed `attempt` (1-based): `backoff * 2^(attempt - 1)`, saturating
    fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = EXPONENTIAL_BACKOFF_BASE
            .checked_pow(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.backoff.saturating_mul(factor)
    }

    fn send_once(&self, body: &str) -> Result<String, ureq::Error> {
        let bearer = format!("Bearer {}", self.api_key);
        self.agent
            .post(self.completions_url.as_str())
            .header("Content-Type", "application/json")
            .header("Authorization", bearer.as_str())
            .send(body)
            .and_then(|mut resp| resp.body_mut().read_to_string())
    }

    fn classify(error: &ureq::Error) -> Attempt {
        match error {
            ureq::Error::StatusCode(status) if *status == 429 || *status >= 500 => {
                Attempt::Retry(format!("HTTP {}", status))
            }
            ureq::Error::StatusCode(status) => Attempt::Fail(LlmError::Rejected {
                status: *status,
                message: format!("HTTP {}", status),
            }),
            ureq::Error::ConnectionFailed
            | ureq::Error::HostNotFound
            | ureq::Error::Timeout(_)
            | ureq::Error::Io(_) => Attempt::Retry(error.to_string()),
            other => Attempt::Fail(LlmError::Unavailable {
                attempts: 1,
                message: other.to_string(),
            }),
        }
    }

    fn send_with_retry(&self, body: &str) -> Result<String, LlmError> {
        let mut last_error = String::from("no attempt made");

        for attempt in 1..=self.retry_attempts {
            debug!(
                "Completion request attempt {}/{}",
                attempt, self.retry_attempts
            );

            match self.send_once(body) {
                Ok(text) => return Ok(text),
                Err(error) => match Self::classify(&error) {
                    Attempt::Fail(LlmError::Unavailable { message, .. }) => {
                        return Err(LlmError::Unavailable {
                            attempts: attempt,
                            message,
                        });
                    }
                    Attempt::Fail(failure) => {
                        warn!("Completion request rejected: {}", failure);
                        return Err(failure);
                    }
                    Attempt::Retry(message) => {
                        warn!(
                            "Transient completion failure: {}, attempt {}/{}",
                            message, attempt, self.retry_attempts
                        );
                        last_error = message;
                    }
                },
            }

            if attempt < self.retry_attempts {
                let delay = self.retry_delay(attempt);
                debug!("Waiting {:?} before retry", delay);
                std::thread::sleep(delay);
            }
        }

        error!(
            "All {} completion attempts to {} failed",
            self.retry_attempts, self.completions_url
        );
        Err(LlmError::Unavailable {
            attempts: self.retry_attempts,
            message: last_error,
        })
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

impl LlmProvider for GroqClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = serde_json::to_string(&ChatRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        })
        .map_err(|e| LlmError::InvalidResponse(format!("failed to encode request: {e}")))?;

        let text = self.send_with_retry(&body)?;
        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| LlmError::InvalidResponse(format!("failed to parse completion: {e}")))?;

        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| LlmError::InvalidResponse("completion contained no text".to_string()))
    }
}
