#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end: config on disk, SQLite storefront, hashing embeddings and an
// OpenAI-compatible completions server standing in for Groq

use axum::body::Body;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bakery_chat::chatbot::Chatbot;
use bakery_chat::config::{Config, EmbeddingProvider};
use bakery_chat::database::Database;
use bakery_chat::embeddings;
use bakery_chat::index::KnowledgeBase;
use bakery_chat::knowledge::KnowledgeExtractor;
use bakery_chat::llm::{GroqClient, LlmProvider};
use bakery_chat::server::{AppState, router};

const COMPLETIONS_PATH: &str = "/openai/v1/chat/completions";
const STORE_INFO: &str = "Store Hours:\nOpen every day from 8 AM to 8 PM\n\nDelivery:\nWe deliver within 5 km for a flat fee of 40\n";

struct Shop {
    _dir: TempDir,
    app: axum::Router,
}

async fn shop(llm_server: &MockServer) -> anyhow::Result<Shop> {
    let dir = TempDir::new()?;
    std::fs::write(dir.path().join("store.txt"), STORE_INFO)?;

    let mut config = Config {
        base_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    config.database.run_migrations = true;
    config.embedding.provider = EmbeddingProvider::Hashing;
    config.embedding.embedding_dimension = 384;
    config.knowledge.store_info_path = Some("store.txt".into());
    config.llm.base_url = format!("http://{}/openai/v1", llm_server.address());
    config.llm.retry_attempts = 2;
    config.save()?;

    let config = Config::load(dir.path())?;
    let database = Database::connect(&config).await?;
    database.seed_sample_data().await?;

    let knowledge = Arc::new(KnowledgeBase::new(
        KnowledgeExtractor::from_config(&config),
        Arc::new(database.clone()),
        embeddings::from_config(&config)?,
        config.index_path(),
    ));
    let llm: Arc<dyn LlmProvider> = Arc::new(
        GroqClient::new(&config.llm, "integration-key")?.with_backoff(Duration::from_millis(5)),
    );
    let chatbot = Arc::new(Chatbot::from_config(&config, &knowledge, llm));
    let state = AppState::new(Some(chatbot), database, knowledge, &config.server);

    Ok(Shop {
        _dir: dir,
        app: router(state),
    })
}

async fn call(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value, Option<String>) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");
    let status = response.status();
    let cookie = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body readable")
        .to_bytes();
    (
        status,
        serde_json::from_slice(&bytes).unwrap_or(Value::Null),
        cookie,
    )
}

async fn csrf_token(app: &axum::Router) -> String {
    let request = Request::builder()
        .uri("/api/chatbot/csrf/")
        .body(Body::empty())
        .expect("valid request");
    let (status, body, cookie) = call(app, request).await;
    assert_eq!(status, StatusCode::OK);

    let token = body["csrf_token"].as_str().expect("token").to_string();
    assert!(cookie.expect("cookie set").contains(&token));
    token
}

fn post(uri: &str, token: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header(COOKIE, format!("csrftoken={token}"))
        .header("x-csrftoken", token)
        .body(Body::from(body))
        .expect("valid request")
}

fn completion(text: &str) -> Value {
    json!({
        "id": "chatcmpl-42",
        "object": "chat.completion",
        "choices": [
            {"index": 0, "message": {"role": "assistant", "content": text}, "finish_reason": "stop"}
        ]
    })
}

#[tokio::test]
async fn browser_session_asks_about_cakes() {
    let llm_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .and(header("Authorization", "Bearer integration-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            "  We have Chocolate Cake and Red Velvet Cake today, buddy!  ",
        )))
        .expect(1)
        .mount(&llm_server)
        .await;

    let shop = shop(&llm_server).await.expect("shop fixture");
    let token = csrf_token(&shop.app).await;

    let (status, refresh, _) = call(
        &shop.app,
        post("/api/chatbot/refresh/", &token, String::new()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // 5 menu items, 2 orders, 1 payment, 2 store sections
    assert_eq!(refresh["documents"], 10);

    let (status, response, _) = call(
        &shop.app,
        post(
            "/api/chatbot/query/",
            &token,
            json!({"message": "What cakes do you have today?"}).to_string(),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        response["answer"],
        "We have Chocolate Cake and Red Velvet Cake today, buddy!"
    );
    let labels: Vec<&str> = response["suggestions"]
        .as_array()
        .expect("suggestions array")
        .iter()
        .filter_map(|s| s["label"].as_str())
        .collect();
    assert!(labels.contains(&"View Menu"));

    let requests = llm_server
        .received_requests()
        .await
        .expect("request recording enabled");
    let sent: Value = serde_json::from_slice(&requests[0].body).expect("json request");
    assert_eq!(sent["messages"][0]["role"], "system");
    let context = sent["messages"]
        .as_array()
        .and_then(|messages| messages.last())
        .and_then(|message| message["content"].as_str())
        .expect("context message");
    assert!(context.starts_with("CONTEXT FROM THE BAKERY DATABASE:"));
    assert!(context.contains("Cake"));
    assert!(context.ends_with("QUESTION: What cakes do you have today?"));
}

#[tokio::test]
async fn llm_outage_is_reported_politely() {
    let llm_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&llm_server)
        .await;

    let shop = shop(&llm_server).await.expect("shop fixture");
    let token = csrf_token(&shop.app).await;
    call(
        &shop.app,
        post("/api/chatbot/refresh/", &token, String::new()),
    )
    .await;

    let (status, response, _) = call(
        &shop.app,
        post(
            "/api/chatbot/query/",
            &token,
            json!({"message": "Do you have croissants?"}).to_string(),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let error = response["error"].as_str().expect("error message");
    assert!(!error.contains("503"));
    assert!(!error.contains(&llm_server.address().to_string()));
}

#[tokio::test]
async fn order_lookup_without_llm_traffic() {
    let llm_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("unused")))
        .expect(0)
        .mount(&llm_server)
        .await;

    let shop = shop(&llm_server).await.expect("shop fixture");
    let request = Request::builder()
        .uri("/api/chatbot/order/status/ORD1001/")
        .body(Body::empty())
        .expect("valid request");
    let (status, body, _) = call(&shop.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["order"]["order_id"], "ORD1001");
    assert_eq!(body["order"]["total"], 580.0);
}
