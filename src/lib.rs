use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChatError>;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database unavailable: {0}")]
    DatabaseUnavailable(String),

    #[error("Upstream service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error(
        "Embedding model mismatch: index was built with '{built}' but '{configured}' is configured. Run `bakery-chat rebuild`."
    )]
    ModelMismatch { built: String, configured: String },

    #[error("Index rebuild failed: {0}")]
    RebuildFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod answer;
pub mod catalog;
pub mod chatbot;
pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod index;
pub mod knowledge;
pub mod llm;
pub mod retrieval;
pub mod server;
