//! Mock vendor server for integration tests
//!
//! Serves a minimal OpenAI-compatible chat completions endpoint and an
//! Anthropic Messages endpoint from the same listener, both returning canned
//! replies and recording every request they receive.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

const DEFAULT_REPLY: &str = "Hello from mock vendor";

/// Mock vendor backend that returns predictable responses
pub struct MockVendor {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

/// A request as the mock received it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub headers: HeaderMap,
    pub body: Value,
}

struct MockState {
    /// Number of requests to fail before succeeding (0 = never fail)
    fail_count: AtomicU32,
    reply: String,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockState {
    fn record(&self, path: &str, headers: HeaderMap, body: &Value) {
        self.requests.lock().unwrap().push(RecordedRequest {
            path: path.to_owned(),
            headers,
            body: body.clone(),
        });
    }

    /// Consume one scheduled failure, if any remain
    fn should_fail(&self) -> bool {
        self.fail_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl MockVendor {
    /// Start the mock server, returning immediately
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_inner(0, DEFAULT_REPLY).await
    }

    /// Start a mock server that fails the first `n` requests with 500
    pub async fn start_failing(n: u32) -> anyhow::Result<Self> {
        Self::start_inner(n, DEFAULT_REPLY).await
    }

    /// Start a mock server replying with `content`
    pub async fn start_with_reply(content: &str) -> anyhow::Result<Self> {
        Self::start_inner(0, content).await
    }

    async fn start_inner(fail_count: u32, reply: &str) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            fail_count: AtomicU32::new(fail_count),
            reply: reply.to_owned(),
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_chat_completions))
            .route("/v1/messages", routing::post(handle_messages))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL including `/v1`; transports append `chat/completions` or `messages`
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Everything received so far, oldest first
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Most recent request
    pub fn last_request(&self) -> RecordedRequest {
        self.requests().pop().expect("mock received no requests")
    }
}

impl Drop for MockVendor {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn failure() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": {
                "message": "mock server intentional failure",
                "type": "server_error"
            }
        })),
    )
        .into_response()
}

fn event_stream(body: String) -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

fn has_tools(body: &Value) -> bool {
    body.get("tools").is_some_and(|t| !t.is_null())
}

fn wants_stream(body: &Value) -> bool {
    body.get("stream").and_then(Value::as_bool).unwrap_or(false)
}

fn model_of(body: &Value) -> String {
    body.get("model").and_then(Value::as_str).unwrap_or("mock-model").to_owned()
}

// -- OpenAI-compatible --

async fn handle_chat_completions(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record("/v1/chat/completions", headers, &body);

    if state.should_fail() {
        return failure();
    }

    if wants_stream(&body) {
        return event_stream(openai_stream_body(&state.reply, &body));
    }

    let message = if has_tools(&body) {
        json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_test_123",
                "type": "function",
                "function": {"name": "get_weather", "arguments": "{\"location\":\"San Francisco\"}"}
            }]
        })
    } else {
        json!({"role": "assistant", "content": state.reply})
    };
    let finish_reason = if has_tools(&body) { "tool_calls" } else { "stop" };

    Json(json!({
        "id": "chatcmpl-test-123",
        "object": "chat.completion",
        "created": 1_700_000_000u64,
        "model": model_of(&body),
        "choices": [{"index": 0, "message": message, "finish_reason": finish_reason}],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    }))
    .into_response()
}

fn openai_stream_body(reply: &str, request: &Value) -> String {
    let model = model_of(request);
    let chunk = |delta: Value, finish_reason: Option<&str>| {
        json!({
            "id": "chatcmpl-test-stream",
            "object": "chat.completion.chunk",
            "created": 1_700_000_000u64,
            "model": model,
            "choices": [{"index": 0, "delta": delta, "finish_reason": finish_reason}]
        })
    };

    let mut frames = Vec::new();

    if has_tools(request) {
        frames.push(chunk(
            json!({
                "role": "assistant",
                "tool_calls": [{
                    "index": 0,
                    "id": "call_test_stream",
                    "type": "function",
                    "function": {"name": "get_weather", "arguments": ""}
                }]
            }),
            None,
        ));
        for part in ["{\"location\":", "\"San Francisco\"}"] {
            frames.push(chunk(
                json!({"tool_calls": [{"index": 0, "function": {"arguments": part}}]}),
                None,
            ));
        }
        frames.push(chunk(json!({}), Some("tool_calls")));
    } else {
        frames.push(chunk(json!({"role": "assistant", "content": ""}), None));
        for word in reply.split_inclusive(' ') {
            frames.push(chunk(json!({"content": word}), None));
        }
        frames.push(chunk(json!({}), Some("stop")));
    }

    // Only sent when the client asked for it, like the real API
    let include_usage = request
        .pointer("/stream_options/include_usage")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if include_usage {
        frames.push(json!({
            "id": "chatcmpl-test-stream",
            "object": "chat.completion.chunk",
            "created": 1_700_000_000u64,
            "model": model,
            "choices": [],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }));
    }

    let mut body: String = frames.iter().map(|frame| format!("data: {frame}\n\n")).collect();
    body.push_str("data: [DONE]\n\n");
    body
}

// -- Anthropic --

async fn handle_messages(State(state): State<Arc<MockState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.record("/v1/messages", headers, &body);

    if state.should_fail() {
        return failure();
    }

    if wants_stream(&body) {
        return event_stream(anthropic_stream_body(&state.reply, &body));
    }

    let (content, stop_reason) = if has_tools(&body) {
        (
            json!([
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "toolu_test_123", "name": "get_weather", "input": {"location": "San Francisco"}}
            ]),
            "tool_use",
        )
    } else {
        (json!([{"type": "text", "text": state.reply}]), "end_turn")
    };

    Json(json!({
        "id": "msg_test_123",
        "type": "message",
        "role": "assistant",
        "model": model_of(&body),
        "content": content,
        "stop_reason": stop_reason,
        "usage": {"input_tokens": 12, "output_tokens": 6}
    }))
    .into_response()
}

fn anthropic_stream_body(reply: &str, request: &Value) -> String {
    let mut events = vec![
        json!({
            "type": "message_start",
            "message": {
                "id": "msg_test_stream",
                "type": "message",
                "role": "assistant",
                "model": model_of(request),
                "content": [],
                "usage": {"input_tokens": 12, "output_tokens": 1}
            }
        }),
        json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
        json!({"type": "ping"}),
    ];

    let stop_reason = if has_tools(request) {
        events.extend([
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Let me check."}}),
            json!({"type": "content_block_stop", "index": 0}),
            json!({
                "type": "content_block_start",
                "index": 1,
                "content_block": {"type": "tool_use", "id": "toolu_test_stream", "name": "get_weather", "input": {}}
            }),
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "{\"location\": "}}),
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "\"San Francisco\"}"}}),
            json!({"type": "content_block_stop", "index": 1}),
        ]);
        "tool_use"
    } else {
        for word in reply.split_inclusive(' ') {
            events.push(json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": word}}));
        }
        events.push(json!({"type": "content_block_stop", "index": 0}));
        "end_turn"
    };

    events.push(json!({
        "type": "message_delta",
        "delta": {"stop_reason": stop_reason, "stop_sequence": null},
        "usage": {"output_tokens": 6}
    }));
    events.push(json!({"type": "message_stop"}));

    events
        .iter()
        .map(|event| {
            let name = event["type"].as_str().unwrap_or("unknown");
            format!("event: {name}\ndata: {event}\n\n")
        })
        .collect()
}
