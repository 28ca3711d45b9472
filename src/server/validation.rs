//! Request body parsing and validation.
//!
//! Bodies are parsed by hand so malformed JSON is reported as a 400 with a
//! readable message rather than the extractor's default rejection.

use serde::Deserialize;

use super::errors::ApiError;
use crate::answer::ConversationTurn;

pub const MAX_MESSAGE_CHARS: usize = 2000;
pub const MAX_HISTORY_TURNS: usize = 50;

#[derive(Debug, Deserialize)]
struct RawQuery {
    #[serde(default, alias = "query")]
    message: Option<String>,
    #[serde(default)]
    conversation_history: Option<Vec<ConversationTurn>>,
}

#[derive(Debug, Deserialize)]
struct RawSearch {
    #[serde(default)]
    query: Option<String>,
}

/// A chat question that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatQuery {
    /// Trimmed message text
    pub message: String,
    pub history: Vec<ConversationTurn>,
}

#[inline]
pub fn parse_query(body: &[u8]) -> Result<ChatQuery, ApiError> {
    let raw: RawQuery = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))?;

    let message = required_text(raw.message, "message")?;
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::BadRequest(format!(
            "message must be at most {MAX_MESSAGE_CHARS} characters"
        )));
    }

    let history = raw.conversation_history.unwrap_or_default();
    if history.len() > MAX_HISTORY_TURNS {
        return Err(ApiError::BadRequest(format!(
            "conversation_history must have at most {MAX_HISTORY_TURNS} turns"
        )));
    }

    Ok(ChatQuery { message, history })
}

/// Menu search text from a `{query}` body
#[inline]
pub fn parse_search(body: &[u8]) -> Result<String, ApiError> {
    let raw: RawSearch = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))?;
    let query = required_text(raw.query, "query")?;
    if query.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::BadRequest(format!(
            "query must be at most {MAX_MESSAGE_CHARS} characters"
        )));
    }
    Ok(query)
}

fn required_text(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        Some(_) => Err(ApiError::BadRequest(format!("{field} must not be empty"))),
        None => Err(ApiError::BadRequest(format!("{field} is required"))),
    }
}
