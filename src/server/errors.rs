//! HTTP error handling
//!
//! Every failure leaving a handler is turned into a status code and a JSON
//! `{error}` body here. Internal detail goes to the log, never to the client.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::ChatError;

pub const UPSTREAM_UNAVAILABLE_MESSAGE: &str =
    "The assistant is temporarily unavailable. Please try again in a moment.";
pub const TIMEOUT_MESSAGE: &str =
    "The assistant is taking too long to answer. Please try again in a moment.";
pub const DATABASE_UNAVAILABLE_MESSAGE: &str =
    "Our store data is temporarily unavailable. Please try again later.";
pub const CHATBOT_DISABLED_MESSAGE: &str =
    "The chatbot is not available right now. Please try again later.";
pub const INTERNAL_ERROR_MESSAGE: &str = "Something went wrong on our side. Please try again later.";

/// Errors produced at the HTTP boundary
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("CSRF verification failed: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Chatbot disabled: no LLM API key configured")]
    ChatbotDisabled,

    #[error("Request timed out")]
    Timeout,

    #[error(transparent)]
    Chat(#[from] ChatError),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ApiError {
    #[inline]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ChatbotDisabled => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Chat(chat) => match chat {
                ChatError::Validation(_) => StatusCode::BAD_REQUEST,
                ChatError::UpstreamUnavailable(_) | ChatError::DatabaseUnavailable(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                ChatError::Config(_)
                | ChatError::Index(_)
                | ChatError::ModelMismatch { .. }
                | ChatError::RebuildFailed(_)
                | ChatError::Io(_)
                | ChatError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Message safe to show to a customer
    #[inline]
    pub fn public_message(&self) -> String {
        match self {
            Self::BadRequest(message) | Self::NotFound(message) => message.clone(),
            Self::Forbidden(_) => "CSRF verification failed.".to_string(),
            Self::ChatbotDisabled => CHATBOT_DISABLED_MESSAGE.to_string(),
            Self::Timeout => TIMEOUT_MESSAGE.to_string(),
            Self::Chat(ChatError::Validation(message)) => message.clone(),
            Self::Chat(ChatError::UpstreamUnavailable(_)) => {
                UPSTREAM_UNAVAILABLE_MESSAGE.to_string()
            }
            Self::Chat(ChatError::DatabaseUnavailable(_)) => {
                DATABASE_UNAVAILABLE_MESSAGE.to_string()
            }
            Self::Chat(_) => INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }

    /// Log the error with appropriate level
    #[inline]
    pub fn log(&self) {
        if self.status().is_server_error() {
            error!("Server error: {}", self);
        } else {
            warn!("Client error: {}", self);
        }
    }
}

impl IntoResponse for ApiError {
    #[inline]
    fn into_response(self) -> Response {
        self.log();
        (
            self.status(),
            Json(ErrorBody {
                error: self.public_message(),
            }),
        )
            .into_response()
    }
}
