use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use std::sync::Arc;
use tower::ServiceExt;

use threadline_api::{
    build_router,
    config::{Config, CorsConfig, LlmConfig, LoggingConfig, ServerConfig},
    state::AppState,
};

fn test_config(base_url: &str) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            request_timeout_secs: 30,
        },
        cors: CorsConfig {
            enabled: true,
            origins: vec!["http://localhost:3000".to_string()],
        },
        llm: LlmConfig {
            model: "gpt-test".to_string(),
            base_url: base_url.to_string(),
            temperature: None,
            system_prompt: None,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        llm_api_key: "test-key".to_string(),
    }
}

fn app(base_url: &str) -> Router {
    let state = AppState::new(test_config(base_url)).unwrap();
    build_router(Arc::new(state))
}

fn chat_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

const PROVIDER_OK: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
    "data: [DONE]\n\n",
);

#[tokio::test]
async fn test_health_reports_healthy() {
    let response = app("http://127.0.0.1:9")
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_chat_streams_line_prefixed_reply() {
    let mut server = mockito::Server::new_async().await;
    let provider = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "model": "gpt-test",
            "stream": true,
            "messages": [{ "role": "user", "content": "hi" }]
        })))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(PROVIDER_OK)
        .create_async()
        .await;

    let response = app(&server.url())
        .oneshot(chat_request(r#"{"messages":[{"role":"user","content":"hi"}]}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/plain; charset=utf-8"
    );
    assert_eq!(
        body_text(response).await,
        "0:\"Hello\"\n0:\" world\"\ne:{\"finishReason\":\"stop\"}\nd:{\"finishReason\":\"stop\"}\n"
    );
    provider.assert_async().await;
}

#[tokio::test]
async fn test_chat_accepts_history_envelope() {
    let mut server = mockito::Server::new_async().await;
    let provider = server
        .mock("POST", "/chat/completions")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "messages": [
                { "role": "user", "content": "hi" },
                { "role": "assistant", "content": "hello" },
                { "role": "user", "content": "again" }
            ]
        })))
        .with_status(200)
        .with_body(PROVIDER_OK)
        .create_async()
        .await;

    let response = app(&server.url())
        .oneshot(chat_request(
            r#"{"history":[["human","hi"],["ai","hello"]],"message":{"content":"again"}}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.starts_with("0:\"Hello\"\n"));
    provider.assert_async().await;
}

#[tokio::test]
async fn test_envelope_system_instructions_reach_provider() {
    let mut server = mockito::Server::new_async().await;
    let provider = server
        .mock("POST", "/chat/completions")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "messages": [
                { "role": "system", "content": "Be brief." },
                { "role": "user", "content": "hi" }
            ]
        })))
        .with_status(200)
        .with_body(PROVIDER_OK)
        .create_async()
        .await;

    let response = app(&server.url())
        .oneshot(chat_request(
            r#"{"history":[],"message":{"content":"hi"},"system_instructions":"Be brief."}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    provider.assert_async().await;
}

#[tokio::test]
async fn test_chat_rejects_empty_or_malformed_input() {
    let app = app("http://127.0.0.1:9");

    let empty = app
        .clone()
        .oneshot(chat_request(r#"{"messages":[]}"#))
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let garbage = app.oneshot(chat_request("not json")).await.unwrap();
    assert!(garbage.status().is_client_error());
}

#[tokio::test]
async fn test_provider_failure_becomes_bad_gateway() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;

    let response = app(&server.url())
        .oneshot(chat_request(r#"{"messages":[{"role":"user","content":"hi"}]}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert!(json["error"].as_str().unwrap().contains("500"));
}

#[tokio::test]
async fn test_mid_stream_error_is_forwarded() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body(concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Par\"}}]}\n\n",
            "data: {\"error\":{\"message\":\"rate limited\"}}\n\n",
        ))
        .create_async()
        .await;

    let response = app(&server.url())
        .oneshot(chat_request(r#"{"messages":[{"role":"user","content":"hi"}]}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_text(response).await,
        "0:\"Par\"\n3:\"rate limited\"\ne:{\"finishReason\":\"error\"}\nd:{\"finishReason\":\"error\"}\n"
    );
}

#[tokio::test]
async fn test_stream_without_done_still_finishes() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body("data: {\"choices\":[{\"delta\":{\"content\":\"cut\"}}]}\n\n")
        .create_async()
        .await;

    let response = app(&server.url())
        .oneshot(chat_request(r#"{"messages":[{"role":"user","content":"hi"}]}"#))
        .await
        .unwrap();

    assert_eq!(
        body_text(response).await,
        "0:\"cut\"\ne:{\"finishReason\":\"stop\"}\nd:{\"finishReason\":\"stop\"}\n"
    );
}
