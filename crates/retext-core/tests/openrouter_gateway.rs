use std::time::Duration;

use retext_core::history::VersionHistory;
use retext_core::pipeline::{PipelineError, TransformPipeline};
use retext_core::providers::{
    GatewayErrorKind, ModelGateway, OpenRouterConfig, OpenRouterGateway,
};
use retext_core::transforms::{TransformationSelection, TransformationSpec, UserContext};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway(server: &MockServer, timeout: Option<Duration>) -> OpenRouterGateway {
    OpenRouterGateway::new(OpenRouterConfig {
        api_key: Some("test-api-key".to_string()),
        base_url: format!("{}/api/v1", server.uri()),
        model: "openai/gpt-4o-mini".to_string(),
        temperature: 0.0,
        timeout,
        include_openrouter_headers: true,
    })
    .unwrap()
}

fn completion(text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "gen-123",
        "model": "openai/gpt-4o-mini",
        "choices": [
            {
                "index": 0,
                "message": { "role": "assistant", "content": text },
                "finish_reason": "stop"
            }
        ]
    })
}

fn selection(prompts: &[&str]) -> TransformationSelection {
    prompts
        .iter()
        .zip(1..)
        .map(|(prompt, id)| TransformationSpec {
            id,
            name: format!("T{id}"),
            category: "Editing".to_string(),
            prompt_text: (*prompt).to_string(),
            user_created: false,
            sort_order: 0,
        })
        .collect()
}

#[tokio::test]
async fn test_transform_sends_wire_request_and_reads_content() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .and(header("authorization", "Bearer test-api-key"))
        .and(header("x-title", "retext"))
        .and(body_partial_json(serde_json::json!({
            "model": "openai/gpt-4o-mini",
            "temperature": 0.0,
            "messages": [
                { "role": "system", "content": "Fix grammar" },
                { "role": "user", "content": "teh cat sat" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("The cat sat.")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let text = gateway(&mock_server, Some(Duration::from_secs(5)))
        .transform("teh cat sat", "Fix grammar")
        .await
        .unwrap();

    assert_eq!(text, "The cat sat.");
}

#[tokio::test]
async fn test_unauthorized_maps_to_auth() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": { "message": "No auth credentials found", "code": 401 }
        })))
        .mount(&mock_server)
        .await;

    let err = gateway(&mock_server, None)
        .transform("text", "prompt")
        .await
        .unwrap_err();

    assert_eq!(err.kind, GatewayErrorKind::Auth);
    assert_eq!(err.message, "HTTP 401: No auth credentials found");
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "30")
                .set_body_string("slow down"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let err = gateway(&mock_server, None)
        .transform("text", "prompt")
        .await
        .unwrap_err();

    assert_eq!(err.kind, GatewayErrorKind::RateLimited);
    assert_eq!(err.retry_after, Some(Duration::from_secs(30)));
    assert_eq!(err.details.as_deref(), Some("slow down"));
}

#[tokio::test]
async fn test_server_error_maps_to_http_status_without_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let err = gateway(&mock_server, None)
        .transform("text", "prompt")
        .await
        .unwrap_err();

    assert_eq!(err.kind, GatewayErrorKind::HttpStatus);
    assert_eq!(err.message, "HTTP 500");
}

#[tokio::test]
async fn test_success_without_choices_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
        )
        .mount(&mock_server)
        .await;

    let err = gateway(&mock_server, None)
        .transform("text", "prompt")
        .await
        .unwrap_err();

    assert_eq!(err.kind, GatewayErrorKind::MalformedResponse);
}

#[tokio::test]
async fn test_slow_response_times_out_as_transport() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("too late"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let err = gateway(&mock_server, Some(Duration::from_millis(200)))
        .transform("text", "prompt")
        .await
        .unwrap_err();

    assert_eq!(err.kind, GatewayErrorKind::Transport);
    assert!(err.message.contains("timed out"), "got: {}", err.message);
}

#[tokio::test]
async fn test_pipeline_composes_multi_edit_prompt_and_appends() {
    let mock_server = MockServer::start().await;

    let expected_prompt = "Please apply the following list of edits to the text:\n\n\
        Fix grammar\n\n---\n\nShorten\n\n\
        \nUser details (customize using these if necessary):\nname: Dana";

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "messages": [
                { "role": "system", "content": expected_prompt },
                { "role": "user", "content": "Hi, i wanted to ask you something" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Quick question.")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let pipeline = TransformPipeline::new(gateway(&mock_server, None));
    let context: UserContext = [("name", "Dana")].into_iter().collect();
    let mut history = VersionHistory::with_original("Hi, i wanted to ask you something");

    let result = pipeline
        .run(
            &selection(&["Fix grammar", "Shorten"]),
            "Hi, i wanted to ask you something",
            Some(&context),
            &mut history,
        )
        .await
        .unwrap();

    assert_eq!(result, "Quick question.");
    assert_eq!(history.count(), 2);
    assert_eq!(history.position(), 2);
}

#[tokio::test]
async fn test_pipeline_gateway_failure_leaves_history() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&mock_server)
        .await;

    let pipeline = TransformPipeline::new(gateway(&mock_server, None));
    let mut history = VersionHistory::with_original("draft");

    let err = pipeline
        .run(&selection(&["Fix grammar"]), "draft", None, &mut history)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Gateway(_)));
    assert_eq!(err.gateway_kind(), Some(GatewayErrorKind::Auth));
    assert_eq!(history.count(), 1);
    assert_eq!(history.current(), "draft");
}
