use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceExt; // for `oneshot`

use codegen_gateway::cache::ResultCache;
use codegen_gateway::config::UpstreamConfig;
use codegen_gateway::handlers::REQUEST_ID_HEADER;
use codegen_gateway::normalize::NO_CODE_PLACEHOLDER;
use codegen_gateway::pipeline::RequestPipeline;
use codegen_gateway::router;
use codegen_gateway::state::AppState;
use codegen_gateway::upstream::UpstreamClient;

fn app(upstream_url: String, timeout: Duration) -> Router {
    let upstream = UpstreamClient::new(&UpstreamConfig {
        url: upstream_url,
        timeout,
        ..UpstreamConfig::default()
    })
    .unwrap();
    let cache = ResultCache::in_memory(Duration::from_secs(3600));
    router(Arc::new(AppState::new(RequestPipeline::new(cache, upstream))))
}

fn completion(code: &str, explanation: &str) -> String {
    let content = json!({ "code": code, "explanation": explanation }).to_string();
    json!({ "choices": [ { "message": { "content": content } } ] }).to_string()
}

async fn post_generate(app: &Router, body: Value) -> (StatusCode, Option<String>, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/generate")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let request_id = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, request_id, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn repeated_request_hits_upstream_once() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion("def add(a, b):\\n\\treturn a + b", "adds"))
        .expect(1)
        .create_async()
        .await;
    let app = app(server.url(), Duration::from_secs(5));
    let body = json!({ "prompt": "add two numbers", "language": "Python" });

    let (status, request_id, first) = post_generate(&app, body.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(request_id.is_some());
    assert_eq!(first["status"], true);
    assert_eq!(first["cached"], false);
    assert_eq!(first["code"], "def add(a, b):\n\treturn a + b");
    assert_eq!(first["explanation"], "adds");
    assert_eq!(first["language"], "Python");
    assert_eq!(first["model"], "gpt-4o-mini");

    let (status, _, second) = post_generate(&app, body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["cached"], true);
    assert_eq!(second["code"], first["code"]);

    mock.assert_async().await;
}

#[tokio::test]
async fn unsupported_language_is_rejected_without_upstream_call() {
    let mut server = mockito::Server::new_async().await;
    let mock = server.mock("POST", "/").expect(0).create_async().await;
    let app = app(server.url(), Duration::from_secs(5));

    let (status, _, body) =
        post_generate(&app, json!({ "prompt": "fold a tree", "language": "Haskell" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], false);
    assert!(body["error"].as_str().unwrap().contains("Haskell"));
    assert!(body.get("retryable").is_none());

    mock.assert_async().await;
}

#[tokio::test]
async fn missing_prompt_is_a_bad_request() {
    let server = mockito::Server::new_async().await;
    let app = app(server.url(), Duration::from_secs(5));

    let (status, _, body) = post_generate(&app, json!({ "language": "Go" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], false);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let server = mockito::Server::new_async().await;
    let app = app(server.url(), Duration::from_secs(5));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/generate")
                .header("content-type", "application/json")
                .body(Body::from("{ not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upstream_timeout_is_retryable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    let app = app(format!("http://{addr}/"), Duration::from_millis(200));

    let (status, _, body) = post_generate(&app, json!({ "prompt": "slow" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], false);
    assert_eq!(body["retryable"], true);
}

#[tokio::test]
async fn upstream_rejection_is_not_retryable() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/")
        .with_status(400)
        .with_body(r#"{"error":"internal key sk-live-1234 rejected"}"#)
        .create_async()
        .await;
    let app = app(server.url(), Duration::from_secs(5));

    let (status, _, body) = post_generate(&app, json!({ "prompt": "x" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["retryable"], false);
    // upstream body is logged, never echoed to the caller
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("400"));
    assert!(!message.contains("sk-live-1234"));
}

#[tokio::test]
async fn empty_generation_returns_placeholder_and_is_not_cached() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_body(completion("  \\n  ", ""))
        .expect(2)
        .create_async()
        .await;
    let app = app(server.url(), Duration::from_secs(5));
    let body = json!({ "prompt": "produce nothing", "language": "Custom" });

    let (status, _, first) = post_generate(&app, body.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["code"], NO_CODE_PLACEHOLDER);
    assert_eq!(first["cached"], false);
    assert!(first.get("explanation").is_none());

    let (_, _, second) = post_generate(&app, body).await;
    assert_eq!(second["cached"], false);

    mock.assert_async().await;
}

#[tokio::test]
async fn health_reports_cache_backend() {
    let server = mockito::Server::new_async().await;
    let app = app(server.url(), Duration::from_secs(5));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["cache"], "memory");
    assert_eq!(body["cache_ok"], true);
}

#[tokio::test]
async fn metrics_expose_request_counter() {
    let server = mockito::Server::new_async().await;
    let app = app(server.url(), Duration::from_secs(5));

    // make sure the counter has been touched at least once
    post_generate(&app, json!({ "prompt": "" })).await;

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("codegen_requests_total"));
}
