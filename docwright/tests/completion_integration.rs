use std::sync::Arc;

use docwright::completion::DeepSeekClient;
use docwright_core::config::CompletionConfig;
use docwright_core::contract::Completer;
use docwright_core::error::CompletionError;
use docwright_core::narrate::Narrator;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> DeepSeekClient {
    let mut config = CompletionConfig::new("test-key");
    config.base_url = server.uri();
    DeepSeekClient::new(config).expect("client builds")
}

#[tokio::test]
async fn returns_first_choice_text_as_received() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/beta/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "deepseek-chat",
            "prompt": "Explain this",
            "max_tokens": 200
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"text": "  It adds. "}, {"text": "ignored"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = client_for(&server).complete("Explain this").await.unwrap();
    assert_eq!(text, "  It adds. ");
}

#[tokio::test]
async fn narrator_trims_completion_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/beta/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"choices": [{"text": "\n Sums a and b.\n"}]})),
        )
        .mount(&server)
        .await;

    let narrator = Narrator::new(Arc::new(client_for(&server)));
    let answer = narrator
        .narrate("def add(a, b): return a + b", "What does the function `add` do?")
        .await
        .unwrap();
    assert_eq!(answer, "Sums a and b.");
}

#[tokio::test]
async fn error_status_carries_body_and_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/beta/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server).complete("anything").await.unwrap_err();
    match err {
        CompletionError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "upstream exploded");
        }
        other => panic!("expected Status error, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_choices_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/beta/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = client_for(&server).complete("anything").await.unwrap_err();
    assert!(matches!(err, CompletionError::Malformed(_)), "got {err:?}");
}
