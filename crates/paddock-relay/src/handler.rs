//! Axum route handlers

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use futures_util::stream;
use http::header::{CACHE_CONTROL, CONTENT_TYPE};
use http::{HeaderName, HeaderValue};
use paddock_config::EndpointKind;
use paddock_core::{ChatTurnRequest, HttpError, ImageTurnRequest, OutboundEvent, SESSION_ID_HEADER};
use tokio::sync::mpsc;

use crate::error::RelayError;
use crate::normalize::check_turn;
use crate::session::{spawn_chat, spawn_image};
use crate::state::RelayState;
use crate::target::ProviderTarget;

/// Build the relay router
pub fn relay_router(state: RelayState) -> Router {
    Router::new()
        .route("/api/chat", routing::post(chat))
        .route("/api/images/generate", routing::post(generate_image))
        .route("/api/images", routing::get(list_images))
        .route("/api/images/{name}", routing::get(image_file))
        .route("/api/sessions/{id}/messages", routing::get(session_messages))
        .route("/api/endpoints", routing::get(list_endpoints))
        .with_state(state)
}

/// Handle `POST /api/chat`
async fn chat(State(state): State<RelayState>, Json(request): Json<ChatTurnRequest>) -> Response {
    let prepared = check_turn(&request)
        .and_then(|()| resolve(&state, &request.endpoint_id, EndpointKind::Chat))
        .and_then(|target| Ok((target, session_header(request.session_id.as_deref())?)));

    let (target, (session_id, header)) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => return error_response(&e),
    };

    let rx = spawn_chat(state, target, request, session_id);
    stream_response(rx, |event: OutboundEvent| event.to_line(), "text/event-stream", header)
}

/// Handle `POST /api/images/generate`
async fn generate_image(State(state): State<RelayState>, Json(request): Json<ImageTurnRequest>) -> Response {
    if request.prompt.trim().is_empty() {
        return error_response(&RelayError::InvalidRequest("prompt must not be empty".to_owned()));
    }

    let prepared = resolve(&state, &request.endpoint_id, EndpointKind::Image)
        .and_then(|target| Ok((target, session_header(request.session_id.as_deref())?)));

    let (target, (session_id, header)) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => return error_response(&e),
    };

    let rx = spawn_image(state, target, request, session_id);
    stream_response(rx, |line: String| line, "text/plain; charset=utf-8", header)
}

/// Handle `GET /api/images`
async fn list_images(State(state): State<RelayState>) -> Response {
    let listed = state
        .catalog()
        .lock()
        .await
        .list(&state.settings().image_output_dir)
        .await;

    match listed {
        Ok(images) => Json(serde_json::json!({ "images": images })).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Handle `GET /api/images/{name}`
async fn image_file(State(state): State<RelayState>, Path(name): Path<String>) -> Response {
    let valid = !name.is_empty() && !name.starts_with('.') && !name.contains(['/', '\\']);
    if !valid {
        return error_response(&RelayError::InvalidRequest(format!("invalid image name '{name}'")));
    }

    match tokio::fs::read(state.settings().image_output_dir.join(&name)).await {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&name).first_or_octet_stream();
            ([(CONTENT_TYPE, mime.essence_str().to_owned())], bytes).into_response()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            error_response(&RelayError::InvalidRequest(format!("image '{name}' not found")))
        }
        Err(e) => error_response(&RelayError::Io(e)),
    }
}

/// Handle `GET /api/sessions/{id}/messages`
async fn session_messages(State(state): State<RelayState>, Path(id): Path<String>) -> Response {
    match state.store().history(&id).await {
        Ok(rows) => Json(serde_json::json!({ "sessionId": id, "messages": rows })).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Handle `GET /api/endpoints`
async fn list_endpoints(State(state): State<RelayState>) -> Response {
    Json(serde_json::json!({ "endpoints": state.endpoints().summaries() })).into_response()
}

fn resolve(state: &RelayState, endpoint_id: &str, kind: EndpointKind) -> Result<Arc<ProviderTarget>, RelayError> {
    let target = state.endpoints().resolve(endpoint_id)?;
    if target.kind != kind {
        return Err(RelayError::InvalidRequest(format!(
            "endpoint '{endpoint_id}' is not a {} endpoint",
            match kind {
                EndpointKind::Chat => "chat",
                EndpointKind::Image => "image",
            }
        )));
    }
    Ok(target)
}

/// Session id to use and its header value; a fresh UUID when none is given
fn session_header(requested: Option<&str>) -> Result<(String, HeaderValue), RelayError> {
    let session_id = requested
        .filter(|id| !id.trim().is_empty())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_owned);

    let header = HeaderValue::from_str(&session_id)
        .map_err(|_| RelayError::InvalidRequest("session id must be printable ASCII".to_owned()))?;

    Ok((session_id, header))
}

fn stream_response<T, F>(rx: mpsc::Receiver<T>, render: F, content_type: &'static str, session: HeaderValue) -> Response
where
    T: Send + 'static,
    F: Fn(T) -> String + Send + 'static,
{
    let lines = stream::unfold((rx, render), |(mut rx, render)| async move {
        let item = rx.recv().await?;
        let line = render(item);
        Some((Ok::<_, Infallible>(line), (rx, render)))
    });

    (
        [
            (CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (HeaderName::from_static(SESSION_ID_HEADER), session),
        ],
        Body::from_stream(lines),
    )
        .into_response()
}

fn error_response(error: &RelayError) -> Response {
    let body = serde_json::json!({
        "error": {
            "message": error.client_message(),
            "type": error.error_type(),
        }
    });

    (error.status_code(), Json(body)).into_response()
}
