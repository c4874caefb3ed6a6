//! Mock upstream provider for integration tests
//!
//! Serves the three chat dialects plus image generation from one listener.
//! Replies are scripted up front and consumed in request order.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

/// One scripted upstream reply
pub enum Reply {
    /// Event-stream body delivered as these chunks, with a short pause between
    Sse(Vec<String>),
    /// JSON body with status 200
    Json(serde_json::Value),
    /// Error status with a JSON body
    Status(u16, serde_json::Value),
    /// Never answers within a test's lifetime
    Stall,
}

/// A request the mock received
#[derive(Debug, Clone)]
pub struct Recorded {
    /// Request path including the query
    pub path: String,
    /// Credential from whichever auth header the dialect uses
    pub credential: Option<String>,
    /// Parsed JSON body
    pub body: serde_json::Value,
}

/// Mock provider backend
pub struct MockUpstream {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

struct MockState {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<Recorded>>,
}

impl MockUpstream {
    /// Start the mock server with its scripted replies
    pub async fn start(replies: impl IntoIterator<Item = Reply>) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle))
            .route("/v1/messages", routing::post(handle))
            .route("/v1/images/generations", routing::post(handle))
            .route("/v1beta/models/{*rest}", routing::post(handle))
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

    /// Base URL for `OpenAI`-compatible and Anthropic endpoints
    pub fn v1_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Base URL for Google endpoints
    pub fn google_url(&self) -> String {
        format!("http://{}/v1beta", self.addr)
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle(State(state): State<Arc<MockState>>, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let credential = ["authorization", "x-api-key", "x-goog-api-key"]
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    state.requests.lock().unwrap().push(Recorded {
        path: uri.path_and_query().map(ToString::to_string).unwrap_or_default(),
        credential,
        body: serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
    });

    let reply = state.replies.lock().unwrap().pop_front();
    match reply {
        Some(Reply::Sse(chunks)) => {
            let stream = futures::stream::iter(chunks).then(|chunk| async move {
                tokio::time::sleep(Duration::from_millis(2)).await;
                Ok::<_, Infallible>(chunk)
            });
            ([("content-type", "text/event-stream")], Body::from_stream(stream)).into_response()
        }
        Some(Reply::Json(body)) => Json(body).into_response(),
        Some(Reply::Status(status, body)) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(body),
        )
            .into_response(),
        Some(Reply::Stall) => {
            tokio::time::sleep(Duration::from_secs(600)).await;
            StatusCode::GATEWAY_TIMEOUT.into_response()
        }
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": {"message": "no scripted reply"}})),
        )
            .into_response(),
    }
}

// -- Stream builders --

/// `OpenAI` stream of raw delta objects, closed by the sentinel
pub fn openai_deltas(deltas: &[serde_json::Value]) -> Vec<String> {
    let mut chunks: Vec<String> = deltas
        .iter()
        .map(|delta| format!("data: {}\n\n", serde_json::json!({"choices": [{"index": 0, "delta": delta}]})))
        .collect();
    chunks.push("data: [DONE]\n\n".to_owned());
    chunks
}

/// `OpenAI` stream carrying plain content chunks
pub fn openai_text(parts: &[&str]) -> Vec<String> {
    let deltas: Vec<_> = parts.iter().map(|part| serde_json::json!({"content": part})).collect();
    openai_deltas(&deltas)
}

/// Anthropic stream with `event:` lines
pub fn anthropic_events(events: &[serde_json::Value]) -> Vec<String> {
    events
        .iter()
        .map(|event| format!("event: {}\ndata: {event}\n\n", event["type"].as_str().unwrap_or("unknown")))
        .collect()
}

/// Google stream; there is no terminal sentinel
pub fn google_chunks(chunks: &[serde_json::Value]) -> Vec<String> {
    chunks.iter().map(|chunk| format!("data: {chunk}\r\n\r\n")).collect()
}

/// Error body in the shape all three dialects share
pub fn error_body(message: &str) -> serde_json::Value {
    serde_json::json!({"error": {"message": message, "type": "error"}})
}
