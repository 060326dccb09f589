use mockito::Matcher;
use serde_json::json;
use threadline_client::stream::NoopObserver;
use threadline_client::{
    consume_stream, ApiClient, ChatGateway, ChatStreamRequest, ChatTurn, ClientConfig,
    GatewayError, MessageId, NewMessage, Role, StreamParser, ThreadId, WireFormat,
};

fn client_for(server: &mockito::Server) -> ApiClient {
    ApiClient::new(ClientConfig::new(server.url())).unwrap()
}

#[tokio::test]
async fn test_create_thread_with_bare_id_response() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/threads")
        .match_body(Matcher::PartialJson(json!({ "title": "Weekend plans" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"thread_id":"t-1"}"#)
        .create_async()
        .await;

    let thread = client_for(&server)
        .create_thread(Some("Weekend plans"))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(thread.id.as_str(), "t-1");
    assert_eq!(thread.title, "Weekend plans");
}

#[tokio::test]
async fn test_list_threads_accepts_both_shapes() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/threads")
        .with_status(200)
        .with_body(
            r#"{"threads":[
                {"id":1,"title":"One","created_at":"2024-01-01T00:00:00","updated_at":"2024-01-02T00:00:00"},
                {"id":"two","title":null}
            ]}"#,
        )
        .create_async()
        .await;

    let threads = client_for(&server).list_threads().await.unwrap();

    assert_eq!(threads.len(), 2);
    assert_eq!(threads[0].id.as_str(), "1");
    assert!(threads[0].updated_at > threads[0].created_at);
    assert!(threads[1].has_default_title());

    let mut bare = mockito::Server::new_async().await;
    bare.mock("GET", "/v1/threads")
        .with_status(200)
        .with_body(r#"[{"id":"solo","title":"Solo"}]"#)
        .create_async()
        .await;

    let threads = client_for(&bare).list_threads().await.unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].title, "Solo");
}

#[tokio::test]
async fn test_get_thread_not_found_is_none() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/threads/missing")
        .with_status(404)
        .with_body(r#"{"detail":"Thread not found"}"#)
        .create_async()
        .await;

    let found = client_for(&server)
        .get_thread(&ThreadId::new("missing"))
        .await
        .unwrap();

    assert!(found.is_none());
}

#[tokio::test]
async fn test_list_messages_normalizes_records() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/threads/t-1/messages")
        .with_status(200)
        .with_body(
            r#"[
                {"message_id":"m1","role":"user","content":"hi","created_at":"2024-03-01T10:00:00Z"},
                {"id":"m2","thread_id":"t-1","content":{"role":"assistant","content":[{"type":"text","text":"hello"}]}},
                {"id":"m3","thread_id":"other","role":"ai","content":[{"type":"text","text":"stray"}]},
                {"role":"user","content":"no id"}
            ]"#,
        )
        .create_async()
        .await;

    let messages = client_for(&server)
        .list_messages(&ThreadId::new("t-1"))
        .await
        .unwrap();

    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].thread_id.as_str(), "t-1");
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "hello");
    assert_eq!(messages[2].thread_id.as_str(), "other");
    assert!(messages.iter().all(|m| !m.is_streaming && !m.key.is_pending()));
}

#[tokio::test]
async fn test_create_message_sends_nested_body_and_bearer() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/threads/t-1/messages")
        .match_header("authorization", "Bearer secret-token")
        .match_body(Matcher::Json(json!({
            "parent_id": "m0",
            "format": "aui/v0",
            "content": {
                "role": "assistant",
                "content": [{ "type": "text", "text": "answer" }],
                "metadata": { "custom": {} }
            }
        })))
        .with_status(200)
        .with_body(r#"{"message_id":"m1"}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    client.set_session_token(Some("secret-token".to_string())).await;

    let id = client
        .create_message(
            &ThreadId::new("t-1"),
            NewMessage::new(Role::Assistant, "answer").with_parent(MessageId::new("m0")),
        )
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(id.as_str(), "m1");
}

#[tokio::test]
async fn test_non_success_status_is_http_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/threads")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;

    let err = client_for(&server).list_threads().await.unwrap_err();

    match err {
        GatewayError::Http { status, body } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "boom");
        }
        other => panic!("Expected Http error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_json_is_decode_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/threads")
        .with_status(200)
        .with_body("<html>")
        .create_async()
        .await;

    let err = client_for(&server).list_threads().await.unwrap_err();
    assert!(matches!(err, GatewayError::Decode(_)));
}

#[tokio::test]
async fn test_chat_stream_without_body_is_missing_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(204)
        .create_async()
        .await;

    let result = client_for(&server)
        .open_chat_stream(ChatStreamRequest::new(vec![ChatTurn::user("hi")]))
        .await;

    assert!(matches!(result, Err(GatewayError::MissingBody)));
}

#[tokio::test]
async fn test_chat_stream_end_to_end() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(json!({
            "messages": [{ "role": "user", "content": "hi" }]
        })))
        .with_status(200)
        .with_header("content-type", "text/plain; charset=utf-8")
        .with_body("0:\"Hel\"\n0:\"lo \"\ne:{\"finishReason\":\"stop\"}\nd:{\"finishReason\":\"stop\"}\n")
        .create_async()
        .await;

    let client = client_for(&server);
    let body = client
        .open_chat_stream(ChatStreamRequest::new(vec![ChatTurn::user("hi")]))
        .await
        .unwrap();

    let outcome = consume_stream(body, StreamParser::new(client.wire_format()), &mut NoopObserver)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(outcome.text, "Hello");
    assert!(outcome.terminated);
}

#[tokio::test]
async fn test_generate_title_reads_text_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/runs/stream")
        .match_body(Matcher::PartialJson(json!({ "thread_id": "t-1" })))
        .with_status(200)
        .with_header("content-type", "application/octet-stream")
        .with_body("  Tokyo Weather Inquiry\n")
        .create_async()
        .await;

    let title = client_for(&server)
        .generate_title(&ThreadId::new("t-1"), &[ChatTurn::user("weather in tokyo?")])
        .await
        .unwrap();

    assert_eq!(title, "Tokyo Weather Inquiry");
}

#[test]
fn test_wire_format_follows_config() {
    let client = ApiClient::new(
        ClientConfig::new("http://localhost:8000").with_wire_format(WireFormat::EventStream),
    )
    .unwrap();

    assert_eq!(client.wire_format(), WireFormat::EventStream);
}

#[test]
fn test_empty_base_url_is_rejected() {
    assert!(matches!(
        ApiClient::new(ClientConfig::new("  ")),
        Err(GatewayError::InvalidConfig(_))
    ));
}

#[tokio::test]
async fn test_event_stream_backend_gets_message_envelope() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/stream2")
        .match_body(Matcher::Json(json!({
            "message": {
                "message_id": "m-user-0000000001",
                "content": "and tomorrow?",
                "thread_id": "t-1"
            },
            "history": [["human", "weather today?"], ["ai", "Sunny."]]
        })))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(concat!(
            "data: {\"metadata\":{\"thread_id\":\"t-1\",\"ai_message_id\":\"m-ai\"}}\n\n",
            "data: {\"chk\":\"Rain.\"}\n\n",
            "data: {\"eofs\":true}\n\n",
        ))
        .create_async()
        .await;

    let client = ApiClient::new(
        ClientConfig::new(server.url())
            .with_chat_path("/v1/stream2")
            .with_wire_format(WireFormat::EventStream),
    )
    .unwrap();

    let request = ChatStreamRequest::new(vec![
        ChatTurn::user("weather today?"),
        ChatTurn::assistant("Sunny."),
        ChatTurn::user("and tomorrow?"),
    ])
    .with_origin(ThreadId::new("t-1"), MessageId::new("m-user-0000000001"));

    let body = client.open_chat_stream(request).await.unwrap();
    let outcome = consume_stream(body, StreamParser::new(client.wire_format()), &mut NoopObserver)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(outcome.text, "Rain.");
    assert_eq!(outcome.message_id.as_deref(), Some("m-ai"));
}

#[tokio::test]
async fn test_event_stream_request_without_turns_is_rejected() {
    let client = ApiClient::new(
        ClientConfig::new("http://127.0.0.1:9").with_wire_format(WireFormat::EventStream),
    )
    .unwrap();

    let result = client.open_chat_stream(ChatStreamRequest::default()).await;

    assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_created_message_without_id_is_unexpected_response() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/threads/t-1/messages")
        .with_status(200)
        .with_body(r#"{"message_id":null}"#)
        .create_async()
        .await;

    let result = client_for(&server)
        .create_message(&ThreadId::new("t-1"), NewMessage::new(Role::User, "hi"))
        .await;

    assert!(matches!(result, Err(GatewayError::UnexpectedResponse(_))));
}
