use std::time::Duration;

use http::StatusCode;
use paddock_core::HttpError;
use thiserror::Error;

/// Longest slice of an upstream error body quoted back to the user
const MAX_QUOTED_BODY: usize = 300;

/// Errors that can occur while relaying a turn
#[derive(Debug, Error)]
pub enum RelayError {
    /// Upstream rejected the credential (401/403)
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Upstream rejected the payload or model parameters (400/422)
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Upstream rate limit hit (429)
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Upstream does not know the model (404)
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// Upstream failed (5xx)
    #[error("upstream server error ({status}): {message}")]
    UpstreamServer { status: u16, message: String },

    /// Connection refused, reset or timed out
    #[error("network error: {0}")]
    Network(String),

    /// A stream line could not be decoded; always recovered by skipping it
    #[error("malformed chunk: {0}")]
    MalformedChunk(String),

    /// Model asked for a tool nobody registered; recovered with a structured result
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Caller sent a turn that cannot be relayed
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No endpoint configured under this id
    #[error("endpoint not found: {0}")]
    EndpointNotFound(String),

    /// Session exceeded its time budget
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Relay is shutting down
    #[error("request cancelled")]
    Cancelled,

    /// Consumer went away; nobody is left to tell
    #[error("client disconnected")]
    ClientGone,

    /// Filesystem failure (attachments, generated images)
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Map an upstream HTTP status and its extracted message
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Auth(message),
            404 => Self::ModelNotFound(message),
            429 => Self::RateLimited(message),
            500.. => Self::UpstreamServer { status, message },
            _ => Self::BadRequest(message),
        }
    }

    /// Map an upstream HTTP error response
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        Self::from_status(status.as_u16(), upstream_message(status, body))
    }

    /// Map an error reported inside an otherwise successful stream
    pub fn from_stream_error(kind: &str, message: impl Into<String>) -> Self {
        let status = match kind {
            "authentication_error" | "UNAUTHENTICATED" => 401,
            "permission_error" | "PERMISSION_DENIED" => 403,
            "not_found_error" | "NOT_FOUND" => 404,
            "rate_limit_error" | "RESOURCE_EXHAUSTED" | "rate_limit_exceeded" => 429,
            "invalid_request_error" | "INVALID_ARGUMENT" => 400,
            "overloaded_error" => 529,
            _ => 500,
        };
        Self::from_status(status, message)
    }

    /// Map a transport failure from reqwest
    pub fn from_transport(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Network(format!("upstream timed out: {error}"))
        } else if error.is_connect() {
            Self::Network(format!("could not connect to upstream: {error}"))
        } else {
            Self::Network(error.to_string())
        }
    }

    /// Whether the error is absorbed without reaching the consumer
    pub const fn is_silent(&self) -> bool {
        matches!(self, Self::MalformedChunk(_) | Self::UnknownTool(_) | Self::ClientGone)
    }

    /// Categorized, human-readable text for the terminal `Error` event
    pub fn user_message(&self) -> String {
        match self {
            Self::Auth(m) => format!("🔑 Authentication Failed: {m}"),
            Self::BadRequest(m) => format!("⚠️ Bad Request: {m}"),
            Self::RateLimited(m) => format!("🚦 Rate Limit Exceeded: {m}"),
            Self::ModelNotFound(m) => format!("🔍 Model Not Found: {m}"),
            Self::UpstreamServer { status, message } => format!("🔥 Provider Error ({status}): {message}"),
            Self::Network(m) => format!("🌐 Network Error: {m}"),
            Self::Timeout(after) => format!("⏱️ Request Timed Out after {}s", after.as_secs()),
            Self::Cancelled => "🛑 Request Cancelled: the relay is shutting down".to_owned(),
            Self::InvalidRequest(m) => format!("⚠️ Invalid Request: {m}"),
            Self::EndpointNotFound(id) => format!("🔍 Unknown Endpoint: {id}"),
            Self::Io(_) | Self::Internal(_) => "❌ Internal Error: the relay failed unexpectedly".to_owned(),
            Self::MalformedChunk(_) | Self::UnknownTool(_) | Self::ClientGone => format!("❌ {self}"),
        }
    }
}

/// Pull the provider's own message out of an error body
///
/// All three dialects nest it under `error.message`; anything else is
/// quoted (truncated) or replaced with the status reason.
pub fn upstream_message(status: StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body).ok().and_then(|value| {
        value
            .pointer("/error/message")
            .or_else(|| value.get("message"))
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned)
    });

    if let Some(message) = from_json {
        return message;
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status.canonical_reason().unwrap_or("no details").to_owned();
    }

    match trimmed.char_indices().nth(MAX_QUOTED_BODY) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_owned(),
    }
}

impl HttpError for RelayError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::BadRequest(_) | Self::UnknownTool(_) => StatusCode::BAD_REQUEST,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::EndpointNotFound(_) | Self::ModelNotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::UpstreamServer { .. } | Self::Network(_) | Self::MalformedChunk(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            Self::ClientGone | Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::InvalidRequest(_) | Self::BadRequest(_) | Self::UnknownTool(_) => "invalid_request_error",
            Self::Auth(_) => "authentication_error",
            Self::EndpointNotFound(_) | Self::ModelNotFound(_) => "not_found_error",
            Self::RateLimited(_) => "rate_limit_error",
            Self::UpstreamServer { .. } | Self::Network(_) | Self::MalformedChunk(_) => "upstream_error",
            Self::Timeout(_) => "timeout_error",
            Self::Cancelled => "unavailable_error",
            Self::ClientGone | Self::Io(_) | Self::Internal(_) => "internal_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Io(_) | Self::Internal(_) => "an internal error occurred".to_owned(),
            other => other.to_string(),
        }
    }
}
