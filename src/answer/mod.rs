
pub mod prompt;
pub mod suggestions;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::Config;
use crate::index::ScoredDocument;
use crate::llm::{CompletionRequest, LlmProvider};
use crate::{ChatError, Result};

pub use suggestions::{Suggestion, SuggestionRule};

/// Reply given when there is nothing indexed to ground an answer on
pub const GENERAL_HELP_ANSWER: &str = "I can help with general questions about our bakery, \
such as our menu, prices, orders, deliveries and payments. Our product information is still \
being loaded, so please try again in a moment or browse the menu.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    #[serde(alias = "assistant")]
    Bot,
}

/// A previous exchange supplied by the caller; never stored server-side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub text: String,
    /// Informational only. Unrecognised formats are dropped rather than rejected.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_timestamp"
    )]
    pub timestamp: Option<DateTime<Utc>>,
}

/// RFC 3339 strings and epoch milliseconds are understood; anything else is `None`
fn lenient_timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(text) => DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc)),
        serde_json::Value::Number(number) => number
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub text: String,
    pub suggestions: Vec<Suggestion>,
    /// False for the canned reply produced without any retrieved context
    pub grounded: bool,
}

pub struct AnswerGenerator {
    llm: Arc<dyn LlmProvider>,
    rules: Vec<SuggestionRule>,
    temperature: f32,
    max_tokens: u32,
    history_turns: usize,
    max_suggestions: usize,
}

impl AnswerGenerator {
    #[inline]
    pub fn from_config(config: &Config, llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            rules: config.suggestions.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            history_turns: config.retrieval.history_turns,
            max_suggestions: config.retrieval.max_suggestions,
        }
    }

    #[inline]
    pub fn general_help(&self) -> Answer {
        Answer {
            text: GENERAL_HELP_ANSWER.to_string(),
            suggestions: suggestions::default_suggestions(&self.rules, self.max_suggestions),
            grounded: false,
        }
    }

    /// Answer `query` from `documents`, using the most recent history turns.
    ///
    /// With no documents the LLM is not called and the general-help answer is returned.
    #[inline]
    pub async fn generate(
        &self,
        query: &str,
        documents: &[ScoredDocument],
        history: &[ConversationTurn],
    ) -> Result<Answer> {
        if documents.is_empty() {
            debug!("No documents retrieved, returning general help");
            return Ok(self.general_help());
        }

        let recent = &history[history.len().saturating_sub(self.history_turns)..];
        let request = CompletionRequest {
            messages: prompt::build_messages(query, documents, recent),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(
            "Requesting completion from {} with {} context documents and {} history turns",
            self.llm.model_id(),
            documents.len(),
            recent.len()
        );

        let llm = Arc::clone(&self.llm);
        let text = tokio::task::spawn_blocking(move || llm.complete(&request))
            .await
            .map_err(|e| ChatError::Other(anyhow::anyhow!("completion task failed: {e}")))?
            .map_err(|e| {
                warn!("Completion failed: {}", e);
                ChatError::UpstreamUnavailable(e.to_string())
            })?;

        Ok(Answer {
            text,
            suggestions: suggestions::suggest(
                &self.rules,
                documents.iter().map(|scored| &scored.document),
                self.max_suggestions,
            ),
            grounded: true,
        })
    }
}

impl std::fmt::Debug for AnswerGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerGenerator")
            .field("model", &self.llm.model_id())
            .field("rules", &self.rules.len())
            .field("history_turns", &self.history_turns)
            .field("max_suggestions", &self.max_suggestions)
            .finish_non_exhaustive()
    }
}
