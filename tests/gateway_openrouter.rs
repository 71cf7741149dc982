use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use idea_arena::gateway::openrouter::{ChatProvider, OpenRouterAdapter};
use idea_arena::gateway::{
    ChatModel, ChatRequest, FinishReason, GatewayConfig, Message, ProviderError, ProviderGateway,
};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn adapter_for(server: &MockServer) -> OpenRouterAdapter {
    OpenRouterAdapter::with_config("sk-test", server.uri(), Duration::from_secs(5)).unwrap()
}

fn request() -> ChatRequest {
    ChatRequest::new(
        ChatModel::openrouter("openai/gpt-5-mini"),
        vec![Message::user("hi")],
    )
}

#[tokio::test]
async fn openrouter_parses_success_content_and_usage() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "content": "hello" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 20 }
        })))
        .mount(&server)
        .await;

    let resp = adapter_for(&server).chat(&request()).await.unwrap();
    assert_eq!(resp.content, "hello");
    assert_eq!(resp.finish_reason, FinishReason::Stop);
    assert_eq!(resp.input_tokens, 10);
    assert_eq!(resp.output_tokens, 20);
}

#[tokio::test]
async fn openrouter_sends_json_response_format_when_requested() {
    let server = MockServer::start().await;

    struct CaptureBody;
    impl Respond for CaptureBody {
        fn respond(&self, req: &Request) -> ResponseTemplate {
            let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
            assert_eq!(body["response_format"]["type"], "json_object");
            assert_eq!(body["max_tokens"], 64);
            ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": { "content": "{}" },
                    "finish_reason": "stop"
                }],
                "usage": { "prompt_tokens": 1, "completion_tokens": 1 }
            }))
        }
    }

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(CaptureBody)
        .mount(&server)
        .await;

    let resp = adapter_for(&server)
        .chat(&request().max_tokens(64).json())
        .await
        .unwrap();
    assert_eq!(resp.content, "{}");
}

#[tokio::test]
async fn openrouter_detects_refusal_from_content() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "content": "I cannot comply with that request." },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 1, "completion_tokens": 1 }
        })))
        .mount(&server)
        .await;

    let err = adapter_for(&server).chat(&request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Refused { .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn openrouter_maps_429_to_rate_limited() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "message": "slow down", "code": "rate_limit_exceeded" }
        })))
        .mount(&server)
        .await;

    let err = adapter_for(&server).chat(&request()).await.unwrap_err();
    match err {
        ProviderError::RateLimited {
            retry_after,
            context,
        } => {
            assert_eq!(retry_after, Duration::from_secs(60));
            let ctx = context.unwrap();
            assert_eq!(ctx.http_status, Some(429));
            assert_eq!(ctx.provider_code.as_deref(), Some("rate_limit_exceeded"));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn openrouter_rejects_missing_usage() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "content": "hello" },
                "finish_reason": "stop"
            }]
        })))
        .mount(&server)
        .await;

    let err = adapter_for(&server).chat(&request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Provider { .. }));
}

#[tokio::test]
async fn gateway_retries_transient_500_then_succeeds() {
    let server = MockServer::start().await;

    struct FlakyOnce {
        calls: Arc<AtomicUsize>,
    }
    impl Respond for FlakyOnce {
        fn respond(&self, _req: &Request) -> ResponseTemplate {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(500).set_body_json(json!({
                    "error": { "message": "upstream hiccup" }
                }))
            } else {
                ResponseTemplate::new(200).set_body_json(json!({
                    "choices": [{
                        "message": { "content": "recovered" },
                        "finish_reason": "stop"
                    }],
                    "usage": { "prompt_tokens": 1, "completion_tokens": 1 }
                }))
            }
        }
    }

    let calls = Arc::new(AtomicUsize::new(0));
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(FlakyOnce {
            calls: calls.clone(),
        })
        .mount(&server)
        .await;

    let gateway = ProviderGateway::with_config(
        adapter_for(&server),
        GatewayConfig {
            max_retries: 2,
            retry_base_delay: Duration::from_millis(10),
        },
    );

    let resp = gateway.chat(request()).await.unwrap();
    assert_eq!(resp.content, "recovered");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn gateway_does_not_retry_invalid_request() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));

    struct Counting {
        calls: Arc<AtomicUsize>,
    }
    impl Respond for Counting {
        fn respond(&self, _req: &Request) -> ResponseTemplate {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ResponseTemplate::new(400).set_body_json(json!({
                "error": { "message": "bad request" }
            }))
        }
    }

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(Counting {
            calls: calls.clone(),
        })
        .mount(&server)
        .await;

    let gateway = ProviderGateway::with_config(
        adapter_for(&server),
        GatewayConfig {
            max_retries: 3,
            retry_base_delay: Duration::from_millis(10),
        },
    );

    let err = gateway.chat(request()).await.unwrap_err();
    assert!(!err.is_retryable());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
