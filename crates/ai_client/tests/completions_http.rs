// OpenAIClient against a mock chat completions endpoint.
// Run with: cargo test -p geoquiz-ai-client --test completions_http

use std::time::Duration;

use geoquiz_ai_client::{AiError, CompletionService, OpenAIClient};
use httpmock::prelude::*;
use serde_json::json;

fn client(server: &MockServer) -> OpenAIClient {
    OpenAIClient::new(&format!("{}/v1/", server.base_url()), "sk-test", "gpt-4o", Duration::from_secs(5))
        .unwrap()
        .with_retries(2, Duration::from_millis(1))
}

fn completion(text: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": text}, "finish_reason": "stop"}]
    })
}

#[test]
fn posts_single_prompt_and_trims_answer() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .header("authorization", "Bearer sk-test")
            .body_includes(r#""model":"gpt-4o""#)
            .body_includes(r#""temperature":0.0"#)
            .body_includes(r#"[{"role":"user","content":"What is the capital of (the) Norway?"}]"#);
        then.status(200).json_body(completion("  Oslo\n"));
    });

    let answer = client(&server)
        .complete("What is the capital of (the) Norway?")
        .unwrap();
    mock.assert();
    assert_eq!(answer, "Oslo");
}

#[test]
fn api_error_message_is_surfaced() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(401)
            .json_body(json!({"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}));
    });

    let err = client(&server).complete("prompt").unwrap_err();
    assert_eq!(
        err,
        AiError::ApiError {
            status: 401,
            message: "Incorrect API key provided".to_string()
        }
    );
    mock.assert_calls(1);
}

#[test]
fn server_errors_are_retried() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(502).body("bad gateway");
    });

    let err = client(&server).complete("prompt").unwrap_err();
    assert!(matches!(err, AiError::ApiError { status: 502, .. }), "{err:?}");
    mock.assert_calls(3);
}

#[test]
fn empty_choices_is_invalid() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(200).json_body(json!({"choices": []}));
    });

    let err = client(&server).complete("prompt").unwrap_err();
    assert!(matches!(err, AiError::InvalidResponse(_)), "{err:?}");
}

#[test]
fn blank_answer_is_invalid() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(200).json_body(completion("   "));
    });

    let err = client(&server).complete("prompt").unwrap_err();
    assert!(matches!(err, AiError::InvalidResponse(_)), "{err:?}");
}
