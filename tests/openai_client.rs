use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use translate_gpt::providers::{BatchItem, TranslateRequest, TranslationClient};
use translate_gpt::{Error, OpenAI};

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/v1", addr)
}

fn batch() -> Vec<BatchItem> {
    vec![
        BatchItem {
            key: "greeting".to_string(),
            text: "Hello".to_string(),
            comment: Some("Launch screen".to_string()),
        },
        BatchItem {
            key: "farewell".to_string(),
            text: "Bye".to_string(),
            comment: None,
        },
    ]
}

fn request() -> TranslateRequest {
    TranslateRequest {
        source_language: "en".to_string(),
        target_language: "fr".to_string(),
        context: None,
    }
}

fn tool_response(translations: Value) -> Value {
    json!({
        "model": "mock-model",
        "choices": [{
            "message": {
                "role": "assistant",
                "tool_calls": [{
                    "type": "function",
                    "function": {
                        "name": "deliver_translations",
                        "arguments": json!({"translations": translations}).to_string()
                    }
                }]
            }
        }],
        "usage": {"prompt_tokens": 40, "completion_tokens": 8, "total_tokens": 48}
    })
}

/// Answers with "<target>:<text>" for every entry of the user message.
async fn echo_handler(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let authorized = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        == Some("Bearer sk-test");
    if !authorized || body["tool_choice"]["function"]["name"] != "deliver_translations" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"message": "bad request shape"}})),
        );
    }
    let entries: Vec<Value> =
        serde_json::from_str(body["messages"][1]["content"].as_str().unwrap_or("[]"))
            .unwrap_or_default();
    let translations = entries
        .iter()
        .map(|entry| {
            json!({
                "key": entry["key"],
                "translation": format!("fr:{}", entry["text"].as_str().unwrap_or_default())
            })
        })
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(tool_response(Value::Array(translations))))
}

#[tokio::test]
async fn returns_translations_in_batch_order() {
    let base_url = serve(Router::new().route("/v1/chat/completions", post(echo_handler))).await;
    let client = OpenAI::new("sk-test").with_base_url(base_url);

    let result = client.translate(&batch(), &request()).await.unwrap();
    assert_eq!(result.translations, ["fr:Hello", "fr:Bye"]);
    assert_eq!(result.model.as_deref(), Some("mock-model"));
    assert_eq!(result.usage.and_then(|usage| usage.total_tokens), Some(48));
}

#[tokio::test]
async fn error_status_is_api_error() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": {"message": "The server had an error", "type": "server_error"}})),
            )
        }),
    );
    let base_url = serve(router).await;
    let client = OpenAI::new("sk-test").with_base_url(base_url);

    let err = client.translate(&batch(), &request()).await.unwrap_err();
    match err {
        Error::Api {
            status, message, ..
        } => {
            assert!(status.starts_with("500"));
            assert_eq!(message, "The server had an error | type: server_error");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn slow_server_is_timeout() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({}))
        }),
    );
    let base_url = serve(router).await;
    let client = OpenAI::new("sk-test").with_base_url(base_url).with_timeout(1);

    let err = client.translate(&batch(), &request()).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { seconds: 1, .. }), "{:?}", err);
}

#[tokio::test]
async fn wrong_translation_count_is_parse_error() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            Json(tool_response(
                json!([{"key": "greeting", "translation": "Bonjour"}]),
            ))
        }),
    );
    let base_url = serve(router).await;
    let client = OpenAI::new("sk-test").with_base_url(base_url);

    let err = client.translate(&batch(), &request()).await.unwrap_err();
    assert!(
        matches!(&err, Error::Parse(message) if message == "expected 2 translations, got 1"),
        "{:?}",
        err
    );
}

fn rate_limit_body() -> Json<Value> {
    Json(json!({"error": {"message": "Rate limit reached for requests", "type": "requests"}}))
}

async fn rate_limited_once(
    State(calls): State<Arc<AtomicUsize>>,
    headers: HeaderMap,
    body: Json<Value>,
) -> (StatusCode, Json<Value>) {
    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
        return (StatusCode::TOO_MANY_REQUESTS, rate_limit_body());
    }
    echo_handler(headers, body).await
}

async fn always_rate_limited(State(calls): State<Arc<AtomicUsize>>) -> (StatusCode, Json<Value>) {
    calls.fetch_add(1, Ordering::SeqCst);
    (StatusCode::TOO_MANY_REQUESTS, rate_limit_body())
}

#[tokio::test]
async fn rate_limited_request_is_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route("/v1/chat/completions", post(rate_limited_once))
        .with_state(calls.clone());
    let base_url = serve(router).await;
    let client = OpenAI::new("sk-test")
        .with_base_url(base_url)
        .with_retry_base_delay(Duration::from_millis(1));

    let result = client.translate(&batch(), &request()).await.unwrap();
    assert_eq!(result.translations, ["fr:Hello", "fr:Bye"]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn persistent_rate_limit_gives_up_after_five_attempts() {
    let calls = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route("/v1/chat/completions", post(always_rate_limited))
        .with_state(calls.clone());
    let base_url = serve(router).await;
    let client = OpenAI::new("sk-test")
        .with_base_url(base_url)
        .with_retry_base_delay(Duration::from_millis(1));

    let err = client.translate(&batch(), &request()).await.unwrap_err();
    match err {
        Error::Api {
            status, message, ..
        } => {
            assert!(status.starts_with("429"));
            assert_eq!(message, "Rate limit reached for requests | type: requests");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}
