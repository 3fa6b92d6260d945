use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use outreach_agent::anthropic::AnthropicClient;
use outreach_agent::openai::OpenAiClient;
use outreach_agent::schema::response_schema;
use outreach_agent::{CompletionRequest, LlmClient, LlmError};

#[derive(Default)]
struct Captured {
    headers: Mutex<Vec<HeaderMap>>,
    bodies: Mutex<Vec<Value>>,
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    format!("http://{address}")
}

impl Captured {
    fn record(&self, headers: HeaderMap, body: Value) {
        self.headers.lock().expect("headers").push(headers);
        self.bodies.lock().expect("bodies").push(body);
    }
}

async fn openai_responses(
    State(captured): State<Arc<Captured>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    captured.record(headers, body);
    Json(json!({
        "output": [{
            "type": "message",
            "content": [{ "type": "output_text", "text": "{\"action\":\"PROBE\"}" }]
        }]
    }))
}

async fn anthropic_messages(
    State(captured): State<Arc<Captured>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    captured.record(headers, body);
    Json(json!({
        "content": [
            { "type": "text", "text": "{\"action\":" },
            { "type": "text", "text": "\"HOLD\"}" }
        ]
    }))
}

fn request() -> CompletionRequest {
    CompletionRequest {
        model: "test-model".to_string(),
        system: Some("You draft replies.".to_string()),
        user: "[PROSPECT]: Thanks".to_string(),
        schema: Some(response_schema()),
        max_tokens: 256,
    }
}

#[tokio::test]
async fn openai_client_posts_responses_request_and_reads_output_text() {
    let captured = Arc::new(Captured::default());
    let router = Router::new()
        .route("/v1/responses", post(openai_responses))
        .with_state(captured.clone());
    let base_url = serve(router).await;

    let client = OpenAiClient::new("sk-test".to_string().into(), Duration::from_secs(5))
        .expect("client")
        .with_base_url(&format!("{base_url}/v1"))
        .with_vector_store(Some("vs_42".to_string()));

    let text = client.complete(&request()).await.expect("completion");
    assert_eq!(text, "{\"action\":\"PROBE\"}");
    assert!(client.retrieval_enabled());

    let headers = captured.headers.lock().expect("headers");
    assert_eq!(headers[0].get("authorization").expect("auth"), "Bearer sk-test");
    let bodies = captured.bodies.lock().expect("bodies");
    assert_eq!(bodies[0]["model"], "test-model");
    assert_eq!(bodies[0]["text"]["format"]["name"], "outreach_response");
    assert_eq!(bodies[0]["tools"][0]["vector_store_ids"][0], "vs_42");
}

#[tokio::test]
async fn anthropic_client_sends_version_header_and_joins_text_blocks() {
    let captured = Arc::new(Captured::default());
    let router = Router::new()
        .route("/v1/messages", post(anthropic_messages))
        .with_state(captured.clone());
    let base_url = serve(router).await;

    let client = AnthropicClient::new("sk-ant".to_string().into(), Duration::from_secs(5))
        .expect("client")
        .with_base_url(&base_url);

    let text = client.complete(&request()).await.expect("completion");
    assert_eq!(text, "{\"action\":\"HOLD\"}");

    let headers = captured.headers.lock().expect("headers");
    assert_eq!(headers[0].get("x-api-key").expect("key"), "sk-ant");
    assert_eq!(headers[0].get("anthropic-version").expect("version"), "2023-06-01");
    let bodies = captured.bodies.lock().expect("bodies");
    assert_eq!(bodies[0]["messages"][0]["role"], "user");
    assert!(bodies[0]["system"].as_str().expect("system").contains("RESPONSE FORMAT"));
}

#[tokio::test]
async fn provider_error_status_is_surfaced_with_body() {
    let router = Router::new().route(
        "/v1/messages",
        post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
    );
    let base_url = serve(router).await;

    let client = AnthropicClient::new("sk-ant".to_string().into(), Duration::from_secs(5))
        .expect("client")
        .with_base_url(&base_url);

    match client.complete(&request()).await {
        Err(LlmError::Http { status, body }) => {
            assert_eq!(status, 429);
            assert_eq!(body, "slow down");
        }
        other => panic!("expected http error, got {other:?}"),
    }
}
