//! Session lifecycle
//!
//! Each turn runs in its own task and writes into a bounded channel that
//! the HTTP body drains. The task ends on the terminal event, on the
//! request timeout, on shutdown, or as soon as the client stops reading.

use std::future::Future;
use std::sync::Arc;

use paddock_core::wire::{error_line, progress_line};
use paddock_core::{ChatTurnRequest, ImageTurnRequest, MediaResult, OutboundEvent};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::emitter::Emitter;
use crate::error::RelayError;
use crate::normalize::normalize;
use crate::orchestrator::Orchestrator;
use crate::state::RelayState;
use crate::store::TranscriptRow;
use crate::target::ProviderTarget;
use crate::types::Role;

/// Events buffered between a session task and its HTTP body
const CHANNEL_CAPACITY: usize = 64;

/// Start a chat turn; the receiver yields its text-turn events
pub fn spawn_chat(
    state: RelayState,
    target: Arc<ProviderTarget>,
    request: ChatTurnRequest,
    session_id: String,
) -> mpsc::Receiver<OutboundEvent> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    tokio::spawn(run_chat(state, target, request, session_id, tx));
    rx
}

async fn run_chat(
    state: RelayState,
    target: Arc<ProviderTarget>,
    request: ChatTurnRequest,
    session_id: String,
    tx: mpsc::Sender<OutboundEvent>,
) {
    let mut emitter = Emitter::new(tx, Instant::now());

    tracing::debug!(
        endpoint = %target.endpoint_id,
        session = %session_id,
        tools = request.tools_enabled,
        "chat turn started"
    );

    let outcome = bounded(&state, chat_turn(&state, &target, &request, &session_id, &mut emitter)).await;

    let assistant_text = match outcome {
        Ok(()) => emitter.answer_text().to_owned(),
        Err(RelayError::ClientGone) => {
            tracing::debug!(
                endpoint = %target.endpoint_id,
                session = %session_id,
                "client disconnected; turn abandoned"
            );
            return;
        }
        Err(e) => {
            tracing::warn!(endpoint = %target.endpoint_id, session = %session_id, error = %e, "chat turn failed");
            let message = e.user_message();
            if emitter.error(message.clone()).await.is_err() {
                return;
            }
            message
        }
    };

    if request.persist {
        persist(&state, &session_id, TranscriptRow::now(Role::Assistant, assistant_text, None)).await;
    }

    tracing::debug!(endpoint = %target.endpoint_id, session = %session_id, "chat turn finished");
}

async fn chat_turn(
    state: &RelayState,
    target: &ProviderTarget,
    request: &ChatTurnRequest,
    session_id: &str,
    emitter: &mut Emitter,
) -> Result<(), RelayError> {
    let normalized = normalize(request, session_id, state.store(), state.settings()).await?;

    if request.persist {
        let row = TranscriptRow::now(Role::User, request.message.clone(), request.image_ref.clone());
        state.store().append(session_id, row).await?;
    }

    let messages = normalized.to_messages(&state.settings().upload_dir).await?;

    let mut orchestrator = Orchestrator::new(target, state.upstream(), state.tools(), state.settings());
    orchestrator.run(messages, normalized.tools_enabled, emitter).await
}

/// Start an image turn; the receiver yields media-family lines
pub fn spawn_image(
    state: RelayState,
    target: Arc<ProviderTarget>,
    request: ImageTurnRequest,
    session_id: String,
) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    tokio::spawn(run_image(state, target, request, session_id, tx));
    rx
}

async fn run_image(
    state: RelayState,
    target: Arc<ProviderTarget>,
    request: ImageTurnRequest,
    session_id: String,
    tx: mpsc::Sender<String>,
) {
    if request.persist {
        persist(&state, &session_id, TranscriptRow::now(Role::User, request.prompt.clone(), None)).await;
    }

    let outcome = bounded(&state, image_turn(&state, &target, &request, &tx)).await;

    let (line, assistant_text) = match outcome {
        Ok(result) => (result.to_line(), result.content),
        Err(RelayError::ClientGone) => {
            tracing::debug!(
                endpoint = %target.endpoint_id,
                session = %session_id,
                "client disconnected; image abandoned"
            );
            return;
        }
        Err(e) => {
            tracing::warn!(endpoint = %target.endpoint_id, session = %session_id, error = %e, "image turn failed");
            let message = e.user_message();
            (error_line(&message), message)
        }
    };

    if tx.send(line).await.is_err() {
        return;
    }

    if request.persist {
        persist(&state, &session_id, TranscriptRow::now(Role::Assistant, assistant_text, None)).await;
    }
}

async fn image_turn(
    state: &RelayState,
    target: &ProviderTarget,
    request: &ImageTurnRequest,
    tx: &mpsc::Sender<String>,
) -> Result<MediaResult, RelayError> {
    let progress =
        |text: String| async move { tx.send(progress_line(&text)).await.map_err(|_| RelayError::ClientGone) };

    progress(format!("Generating image with {}", target.display_name)).await?;
    let image = state.upstream().generate_image(target, &request.prompt).await?;

    progress("Saving image".to_owned()).await?;
    let dir = &state.settings().image_output_dir;
    tokio::fs::create_dir_all(dir).await?;
    let file_name = format!("{}.png", uuid::Uuid::new_v4());
    tokio::fs::write(dir.join(&file_name), &image.bytes).await?;
    state.catalog().lock().await.invalidate();

    tracing::info!(endpoint = %target.endpoint_id, file = %file_name, bytes = image.bytes.len(), "image generated");

    Ok(MediaResult {
        content: image.revised_prompt.unwrap_or_else(|| request.prompt.clone()),
        image_path: file_name,
    })
}

/// Run a turn under the request timeout and the shutdown token
async fn bounded<T>(state: &RelayState, turn: impl Future<Output = Result<T, RelayError>>) -> Result<T, RelayError> {
    let budget = state.settings().request_timeout;
    let cancel = state.shutdown().child_token();

    tokio::select! {
        () = cancel.cancelled() => Err(RelayError::Cancelled),
        result = tokio::time::timeout(budget, turn) => result.unwrap_or(Err(RelayError::Timeout(budget))),
    }
}

async fn persist(state: &RelayState, session_id: &str, row: TranscriptRow) {
    if let Err(e) = state.store().append(session_id, row).await {
        tracing::error!(session = %session_id, error = %e, "failed to persist transcript row");
    }
}
