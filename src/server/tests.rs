use super::*;
use axum::body::Body;
use axum::http::Request;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::config::Config;
use crate::embeddings::HashingEmbedder;
use crate::knowledge::KnowledgeExtractor;
use crate::llm::{CompletionRequest, LlmError, LlmProvider};

const TOKEN: &str = "3f1c0d2b9a8e4f6b8c7d6e5f4a3b2c1d";

enum Behaviour {
    /// Reply with the menu item names found in the context
    Echo,
    Down,
    Slow(Duration),
}

struct FakeLlm {
    behaviour: Behaviour,
    calls: AtomicUsize,
}

impl FakeLlm {
    fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LlmProvider for FakeLlm {
    fn model_id(&self) -> &str {
        "fake"
    }

    fn complete(&self, request: &CompletionRequest) -> std::result::Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            Behaviour::Echo => {
                let context = request
                    .messages
                    .last()
                    .map(|m| m.content.as_str())
                    .unwrap_or_default();
                let names: Vec<&str> = context
                    .lines()
                    .filter_map(|line| line.strip_prefix("Menu Item: "))
                    .collect();
                Ok(format!("We have {} today, buddy!", names.join(", ")))
            }
            Behaviour::Down => Err(LlmError::Unavailable {
                attempts: 3,
                message: "operation timed out".to_string(),
            }),
            Behaviour::Slow(delay) => {
                std::thread::sleep(*delay);
                Ok("late".to_string())
            }
        }
    }
}

struct Fixture {
    _dir: TempDir,
    database: Database,
    knowledge: Arc<KnowledgeBase>,
    state: AppState,
}

async fn fixture(llm: Option<Arc<FakeLlm>>) -> Fixture {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let database = Database::new(dir.path().join("db.sqlite3"), 2)
        .await
        .expect("Failed to open database");
    database.run_migrations().await.expect("migrations run");
    database.seed_sample_data().await.expect("sample data seeded");

    let store_info = dir.path().join("store.txt");
    std::fs::write(&store_info, "Store Hours:\nOpen every day from 8 AM to 8 PM\n")
        .expect("store info written");

    let knowledge = Arc::new(KnowledgeBase::new(
        KnowledgeExtractor::new("₹", Some(store_info)),
        Arc::new(database.clone()),
        Arc::new(HashingEmbedder::new(384)),
        dir.path().join("index.json"),
    ));

    let config = Config::default();
    let chatbot = llm.map(|llm| {
        Arc::new(Chatbot::from_config(
            &config,
            &knowledge,
            llm as Arc<dyn LlmProvider>,
        ))
    });
    let state = AppState::new(
        chatbot,
        database.clone(),
        Arc::clone(&knowledge),
        &config.server,
    );

    Fixture {
        _dir: dir,
        database,
        knowledge,
        state,
    }
}

fn post(uri: &str, body: &str, with_csrf: bool) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if with_csrf {
        builder = builder
            .header("cookie", format!("csrftoken={TOKEN}"))
            .header("x-csrftoken", TOKEN);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("valid request")
}

async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = router(state.clone())
        .oneshot(request)
        .await
        .expect("router is infallible");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body readable")
        .to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

fn query(message: &str) -> String {
    json!({"message": message}).to_string()
}

#[tokio::test]
async fn healthz_is_ok() {
    let fx = fixture(None).await;
    let (status, _, _) = send(&fx.state, get("/healthz")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn csrf_endpoint_sets_cookie() {
    let fx = fixture(None).await;
    let (status, headers, body) = send(&fx.state, get("/api/chatbot/csrf/")).await;

    assert_eq!(status, StatusCode::OK);
    let token = body["csrf_token"].as_str().expect("token in body");
    let cookie = headers
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("cookie set");
    assert_eq!(cookie, format!("csrftoken={token}; Path=/; SameSite=Lax"));
}

#[tokio::test]
async fn query_without_csrf_is_forbidden() {
    let llm = FakeLlm::new(Behaviour::Echo);
    let fx = fixture(Some(Arc::clone(&llm))).await;

    let (status, _, body) = send(
        &fx.state,
        post("/api/chatbot/query/", &query("What cakes?"), false),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn invalid_queries_never_reach_the_pipeline() {
    let llm = FakeLlm::new(Behaviour::Echo);
    let fx = fixture(Some(Arc::clone(&llm))).await;
    fx.knowledge.refresh().await.expect("index built");

    for body in [
        query(""),
        query("   \n "),
        "{\"message\": ".to_string(),
        json!({"message": "a".repeat(2001)}).to_string(),
        "{}".to_string(),
    ] {
        let (status, _, response) =
            send(&fx.state, post("/api/chatbot/query/", &body, true)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        assert!(response["error"].is_string());
    }

    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn query_before_index_gives_general_help() {
    let llm = FakeLlm::new(Behaviour::Echo);
    let fx = fixture(Some(Arc::clone(&llm))).await;

    let (status, _, body) = send(
        &fx.state,
        post("/api/chatbot/query/", &query("Do you deliver?"), true),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], crate::answer::GENERAL_HELP_ANSWER);
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn cake_question_end_to_end() {
    let llm = FakeLlm::new(Behaviour::Echo);
    let fx = fixture(Some(Arc::clone(&llm))).await;

    let (status, _, refresh) = send(&fx.state, post("/api/chatbot/refresh/", "", true)).await;
    assert_eq!(status, StatusCode::OK);
    // 5 menu items, 2 orders, 1 payment, 1 store section
    assert_eq!(refresh["documents"], 9);
    assert_eq!(refresh["persisted"], true);

    let body = json!({
        "message": "What cakes do you have today?",
        "conversation_history": [
            {"role": "user", "text": "hello"},
            {"role": "bot", "text": "Hello dear, how can I help?"}
        ]
    })
    .to_string();
    let (status, _, response) = send(&fx.state, post("/api/chatbot/query/", &body, true)).await;

    assert_eq!(status, StatusCode::OK);
    let answer = response["answer"].as_str().expect("answer text");
    assert!(answer.contains("Chocolate Cake") || answer.contains("Red Velvet Cake"));
    let labels: Vec<&str> = response["suggestions"]
        .as_array()
        .expect("suggestions array")
        .iter()
        .filter_map(|s| s["label"].as_str())
        .collect();
    assert!(labels.contains(&"View Menu"));
    let timestamp = response["timestamp"].as_str().expect("timestamp");
    assert!(DateTime::parse_from_rfc3339(timestamp).is_ok());
    assert!(timestamp.ends_with('Z'));
    assert_eq!(llm.calls(), 1);
}

#[tokio::test]
async fn llm_outage_is_a_friendly_503() {
    let fx = fixture(Some(FakeLlm::new(Behaviour::Down))).await;
    fx.knowledge.refresh().await.expect("index built");

    let (status, _, body) = send(
        &fx.state,
        post("/api/chatbot/query/", &query("What cakes do you have?"), true),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({"error": errors::UPSTREAM_UNAVAILABLE_MESSAGE}));
}

#[tokio::test]
async fn slow_pipeline_times_out() {
    let fx = fixture(Some(FakeLlm::new(Behaviour::Slow(Duration::from_millis(
        500,
    )))))
    .await;
    fx.knowledge.refresh().await.expect("index built");
    let state = fx.state.clone().with_request_timeout(Duration::from_millis(50));

    let (status, _, body) = send(
        &state,
        post("/api/chatbot/query/", &query("What cakes do you have?"), true),
    )
    .await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"], errors::TIMEOUT_MESSAGE);
}

#[tokio::test]
async fn missing_api_key_only_disables_queries() {
    let fx = fixture(None).await;

    let (status, _, body) = send(
        &fx.state,
        post("/api/chatbot/query/", &query("What cakes?"), true),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], errors::CHATBOT_DISABLED_MESSAGE);

    let (status, _, body) = send(
        &fx.state,
        post("/api/chatbot/order/search/", r#"{"query": "cake"}"#, true),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["found"], true);

    let (_, _, status_body) = send(&fx.state, get("/api/chatbot/status/")).await;
    assert_eq!(status_body["chatbot_enabled"], false);
}

#[tokio::test]
async fn status_reflects_index() {
    let fx = fixture(Some(FakeLlm::new(Behaviour::Echo))).await;

    let (status, _, body) = send(&fx.state, get("/api/chatbot/status/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["initialized"], false);
    assert_eq!(body["status"], "not initialized");
    assert_eq!(body["embedding_model"], "hashing-xxh64:d384");
    assert!(body["built_at"].is_null());

    fx.knowledge.refresh().await.expect("index built");
    let (_, _, body) = send(&fx.state, get("/api/chatbot/status/")).await;
    assert_eq!(body["initialized"], true);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["documents"], 9);
    assert_eq!(body["chatbot_enabled"], true);
}

#[tokio::test]
async fn failed_refresh_keeps_serving_stale_index() {
    let fx = fixture(Some(FakeLlm::new(Behaviour::Echo))).await;
    fx.knowledge.refresh().await.expect("index built");

    fx.database.pool().close().await;
    let (status, _, body) = send(&fx.state, post("/api/chatbot/refresh/", "", true)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], errors::DATABASE_UNAVAILABLE_MESSAGE);

    let (_, _, body) = send(&fx.state, get("/api/chatbot/status/")).await;
    assert_eq!(body["documents"], 9);
}

#[tokio::test]
async fn refresh_requires_csrf() {
    let fx = fixture(None).await;
    let (status, _, _) = send(&fx.state, post("/api/chatbot/refresh/", "", false)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(fx.knowledge.current_header().await.is_none());
}

#[tokio::test]
async fn order_search_tiers() {
    let fx = fixture(None).await;

    let (status, _, body) = send(
        &fx.state,
        post("/api/chatbot/order/search/", r#"{"query": "cake"}"#, true),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["items"]
        .as_array()
        .expect("items")
        .iter()
        .filter_map(|item| item["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Chocolate Cake", "Red Velvet Cake"]);
    assert_eq!(body["items"][0]["price"], 450.0);

    let (_, _, body) = send(
        &fx.state,
        post("/api/chatbot/order/search/", r#"{"query": "ramen"}"#, true),
    )
    .await;
    assert_eq!(body["found"], false);
    assert!(body["items"].as_array().expect("items").is_empty());

    let (status, _, _) = send(
        &fx.state,
        post("/api/chatbot/order/search/", r#"{"query": " "}"#, true),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn order_status_lookup() {
    let fx = fixture(None).await;

    let (status, _, body) = send(&fx.state, get("/api/chatbot/order/status/ORD1001/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["order"]["order_id"], "ORD1001");
    assert_eq!(body["order"]["status"], "Delivered");
    assert_eq!(body["order"]["total"], 580.0);
    assert_eq!(body["order"]["items"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["order"]["items"][0]["name"], "Chocolate Cake");

    let (status, _, body) = send(&fx.state, get("/api/chatbot/order/status/NOPE/")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        json!({"success": false, "message": "Order not found."})
    );
}
