//! HTTP surface of the chatbot: the query endpoint plus the supporting
//! csrf, refresh, status, menu search and order status endpoints.

#[cfg(test)]
mod tests;

pub mod csrf;
pub mod errors;
pub mod validation;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::ChatError;
use crate::answer::Suggestion;
use crate::catalog::{self, MenuSearch};
use crate::chatbot::Chatbot;
use crate::config::ServerConfig;
use crate::database::Database;
use crate::index::KnowledgeBase;

pub use errors::ApiError;

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    chatbot: Option<Arc<Chatbot>>,
    database: Database,
    knowledge: Arc<KnowledgeBase>,
    request_timeout: Duration,
    csrf_protection: bool,
}

impl AppState {
    /// `chatbot` is `None` when no LLM API key is configured; only `/query/` is affected
    #[inline]
    pub fn new(
        chatbot: Option<Arc<Chatbot>>,
        database: Database,
        knowledge: Arc<KnowledgeBase>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            chatbot,
            database,
            knowledge,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            csrf_protection: config.csrf_protection,
        }
    }

    #[inline]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn check_csrf(&self, headers: &HeaderMap) -> ApiResult<()> {
        if self.csrf_protection {
            csrf::verify(headers)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("chatbot_enabled", &self.chatbot.is_some())
            .field("request_timeout", &self.request_timeout)
            .field("csrf_protection", &self.csrf_protection)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub suggestions: Vec<Suggestion>,
    /// RFC 3339, UTC
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct CsrfResponse {
    pub csrf_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub message: String,
    pub documents: usize,
    pub built_at: DateTime<Utc>,
    pub persisted: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub initialized: bool,
    pub status: &'static str,
    pub documents: usize,
    pub embedding_model: String,
    pub built_at: Option<DateTime<Utc>>,
    pub chatbot_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct OrderLineView {
    pub name: String,
    pub quantity: i64,
    pub price: f64,
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    pub order_id: String,
    pub status: String,
    pub total: f64,
    pub delivery_address: String,
    pub created_at: String,
    pub items: Vec<OrderLineView>,
}

#[derive(Debug, Serialize)]
pub struct OrderStatusResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[inline]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/chatbot/query/", post(query_handler))
        .route("/api/chatbot/csrf/", get(csrf_handler))
        .route("/api/chatbot/refresh/", post(refresh_handler))
        .route("/api/chatbot/status/", get(status_handler))
        .route("/api/chatbot/order/search/", post(order_search_handler))
        .route(
            "/api/chatbot/order/status/{order_id}/",
            get(order_status_handler),
        )
        .with_state(state)
}

/// Serve `state` on `bind` until Ctrl+C
#[inline]
pub async fn serve(bind: &str, state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address {}", bind))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("Chatbot API listening on http://{}", addr);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received interrupt signal, shutting down");
        })
        .await
        .context("server shutdown")?;
    Ok(())
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn query_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<QueryResponse>> {
    state.check_csrf(&headers)?;
    let query = validation::parse_query(&body)?;
    let chatbot = state.chatbot.as_ref().ok_or(ApiError::ChatbotDisabled)?;

    debug!(
        "Chat query ({} chars, {} history turns)",
        query.message.chars().count(),
        query.history.len()
    );

    let answer = tokio::time::timeout(
        state.request_timeout,
        chatbot.ask(&query.message, &query.history),
    )
    .await
    .map_err(|_| ApiError::Timeout)??;

    Ok(Json(QueryResponse {
        answer: answer.text,
        suggestions: answer.suggestions,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }))
}

async fn csrf_handler() -> impl IntoResponse {
    let token = csrf::new_token();
    (
        [(SET_COOKIE, csrf::set_cookie_value(&token))],
        Json(CsrfResponse { csrf_token: token }),
    )
}

async fn refresh_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<RefreshResponse>> {
    state.check_csrf(&headers)?;
    let report = state.knowledge.refresh().await?;

    Ok(Json(RefreshResponse {
        message: "Chatbot data refreshed successfully".to_string(),
        documents: report.documents,
        built_at: report.built_at,
        persisted: report.persisted,
    }))
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let header = state.knowledge.current_header().await;
    let chatbot_enabled = state.chatbot.is_some();

    Json(match header {
        Some(header) => StatusResponse {
            initialized: true,
            status: "ready",
            documents: header.document_count,
            embedding_model: header.embedding_model,
            built_at: Some(header.built_at),
            chatbot_enabled,
        },
        None => StatusResponse {
            initialized: false,
            status: "not initialized",
            documents: 0,
            embedding_model: state.knowledge.embedder().model_id().to_string(),
            built_at: None,
            chatbot_enabled,
        },
    })
}

async fn order_search_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<MenuSearch>> {
    state.check_csrf(&headers)?;
    let query = validation::parse_search(&body)?;

    let items = state
        .database
        .list_available_menu_items()
        .await
        .map_err(|e| ChatError::DatabaseUnavailable(format!("{e:#}")))?;

    Ok(Json(catalog::search_menu(&items, &query)))
}

async fn order_status_handler(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> ApiResult<(StatusCode, Json<OrderStatusResponse>)> {
    let found = state
        .database
        .get_order(order_id.trim())
        .await
        .map_err(|e| ChatError::DatabaseUnavailable(format!("{e:#}")))?;

    let Some((order, lines)) = found else {
        debug!("Order {} not found", order_id);
        return Ok((
            StatusCode::NOT_FOUND,
            Json(OrderStatusResponse {
                success: false,
                order: None,
                message: Some("Order not found.".to_string()),
            }),
        ));
    };

    let view = OrderView {
        status: order.status_label(),
        total: order.grand_total(),
        created_at: order.created_at.format("%Y-%m-%d %H:%M").to_string(),
        items: lines
            .into_iter()
            .map(|line| OrderLineView {
                name: line.item_name,
                quantity: line.quantity,
                price: line.price,
            })
            .collect(),
        order_id: order.order_ref,
        delivery_address: order.delivery_address,
    };

    Ok((
        StatusCode::OK,
        Json(OrderStatusResponse {
            success: true,
            order: Some(view),
            message: None,
        }),
    ))
}
