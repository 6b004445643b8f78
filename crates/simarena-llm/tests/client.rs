//! HTTP-level tests for `OpenAiClient` against a mock completion server.

#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::unreachable)]

use std::sync::Mutex;

use serde_json::json;
use simarena_core::completion::{ChatMessage, CompletionClient, CompletionError};
use simarena_core::config::LlmSettings;
use simarena_llm::OpenAiClient;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(server: &MockServer) -> LlmSettings {
    LlmSettings {
        base_url: format!("{}/v1", server.uri()),
        model: "test-model".to_owned(),
        api_key: "sk-test".to_owned(),
        timeout_secs: 5,
        retry_backoff_ms: 0,
    }
}

fn messages() -> Vec<ChatMessage> {
    vec![ChatMessage::system("You are an agent."), ChatMessage::user("Execute round 1.")]
}

fn sse_body(events: &[&str]) -> String {
    events.iter().map(|e| format!("data: {e}\n\n")).collect()
}

fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "id": "cmpl-1",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
    })
}

#[tokio::test]
async fn blocking_completion_returns_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({ "model": "test-model", "stream": false, "max_tokens": 1200 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("The market calmed.")))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiClient::new(&settings(&server)).unwrap();
    let text = client.complete_blocking(&messages(), 1200).await.unwrap();
    assert_eq!(text, "The market calmed.");
}

#[tokio::test]
async fn unlimited_budget_omits_max_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok")))
        .mount(&server)
        .await;

    let client = OpenAiClient::new(&settings(&server)).unwrap();
    client.complete_blocking(&messages(), 0).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = requests[0].body_json().unwrap();
    assert!(body.get("max_tokens").is_none());
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "Execute round 1.");
}

#[tokio::test]
async fn streaming_concatenates_deltas_until_done() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#,
        r#"{"choices":[{"index":0,"delta":{"content":"I open "}}]}"#,
        "not json at all",
        r#"{"choices":[{"index":0,"delta":{"content":"my stall."}}]}"#,
        "[DONE]",
        r#"{"choices":[{"index":0,"delta":{"content":" ignored"}}]}"#,
    ]);
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({ "stream": true, "max_tokens": 400 })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiClient::new(&settings(&server)).unwrap();
    let seen = Mutex::new(Vec::new());
    let text = client
        .stream_with(&messages(), 400, |delta| seen.lock().unwrap().push(delta.to_owned()))
        .await
        .unwrap();

    assert_eq!(text, "I open my stall.");
    assert_eq!(*seen.lock().unwrap(), vec!["I open ", "my stall."]);
}

#[tokio::test]
async fn failed_attempt_is_retried_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("second time lucky")))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiClient::new(&settings(&server)).unwrap();
    let text = client.complete_blocking(&messages(), 400).await.unwrap();
    assert_eq!(text, "second time lucky");
}

#[tokio::test]
async fn persistent_error_gives_up_after_two_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .expect(2)
        .mount(&server)
        .await;

    let client = OpenAiClient::new(&settings(&server)).unwrap();
    let err = client.complete_streaming(&messages(), 400).await.unwrap_err();

    match &err {
        CompletionError::Exhausted {
            operation,
            attempts,
            last,
        } => {
            assert_eq!(*operation, "streaming chat completion");
            assert_eq!(*attempts, 2);
            assert!(matches!(**last, CompletionError::Status { status: 500, .. }));
        }
        other => unreachable!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("LLM API error 500: internal"));
}

#[tokio::test]
async fn empty_choices_count_as_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .expect(2)
        .mount(&server)
        .await;

    let client = OpenAiClient::new(&settings(&server)).unwrap();
    let err = client.complete_blocking(&messages(), 400).await.unwrap_err();
    assert!(err.to_string().ends_with("no choices in response"));
}

#[tokio::test]
async fn stream_without_choices_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse_body(&["[DONE]"])))
        .expect(2)
        .mount(&server)
        .await;

    let client = OpenAiClient::new(&settings(&server)).unwrap();
    let result = client.complete_streaming(&messages(), 0).await;
    assert!(matches!(result, Err(CompletionError::Exhausted { .. })));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let config = LlmSettings {
        base_url: "http://127.0.0.1:9/v1".to_owned(),
        retry_backoff_ms: 0,
        ..LlmSettings::default()
    };

    let client = OpenAiClient::new(&config).unwrap();
    let err = client.complete_blocking(&messages(), 400).await.unwrap_err();
    match err {
        CompletionError::Exhausted { last, .. } => {
            assert!(matches!(*last, CompletionError::Transport(_)));
        }
        other => unreachable!("unexpected error: {other}"),
    }
}
