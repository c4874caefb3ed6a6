//! Request normalizer
//!
//! Turns an inbound [`ChatTurnRequest`] plus the session transcript into an
//! immutable [`NormalizedRequest`]. Image references stay references until
//! [`NormalizedRequest::to_messages`] reads them for one upstream call.

use std::path::Path;

use paddock_config::RelayConfig;
use paddock_core::ChatTurnRequest;

use crate::attachment;
use crate::error::RelayError;
use crate::store::TranscriptStore;
use crate::types::{Content, ContentPart, Message, Role};

/// Appended to the system prompt when tools are offered
pub const TOOL_INSTRUCTION: &str = "You can call the provided functions when they help answer the user. \
     Results of those calls will be supplied to you afterwards; use them to give the final answer.";

/// One turn of the conversation, image still unresolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// Author
    pub role: Role,
    /// Text
    pub text: String,
    /// Image relative to the upload directory
    pub image_ref: Option<String>,
}

/// Everything the adapter needs to build round one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRequest {
    /// Effective system prompt
    pub system_prompt: Option<String>,
    /// Earlier turns in chronological order
    pub prior_turns: Vec<Turn>,
    /// The turn being answered
    pub new_turn: Turn,
    /// Whether history was requested
    pub include_history: bool,
    /// Whether tools are offered
    pub tools_enabled: bool,
}

/// Reject turns that carry nothing to answer
pub fn check_turn(request: &ChatTurnRequest) -> Result<(), RelayError> {
    if request.message.trim().is_empty() && request.image_ref.as_deref().is_none_or(|r| r.trim().is_empty()) {
        return Err(RelayError::InvalidRequest(
            "message must not be empty unless an image is attached".to_owned(),
        ));
    }
    Ok(())
}

/// Build the normalized request for a turn
///
/// History is read before the new user turn is persisted, so the new turn
/// never appears twice.
pub async fn normalize(
    request: &ChatTurnRequest,
    session_id: &str,
    store: &dyn TranscriptStore,
    settings: &RelayConfig,
) -> Result<NormalizedRequest, RelayError> {
    check_turn(request)?;

    let prior_turns = if request.include_history {
        store
            .history(session_id)
            .await?
            .into_iter()
            .filter(|row| matches!(row.role, Role::User | Role::Assistant))
            .map(|row| Turn {
                role: row.role,
                text: row.text,
                image_ref: row.image_ref,
            })
            .collect()
    } else {
        Vec::new()
    };

    Ok(NormalizedRequest {
        system_prompt: system_prompt(settings, request.tools_enabled),
        prior_turns,
        new_turn: Turn {
            role: Role::User,
            text: request.message.clone(),
            image_ref: request.image_ref.clone().filter(|r| !r.trim().is_empty()),
        },
        include_history: request.include_history,
        tools_enabled: request.tools_enabled,
    })
}

fn system_prompt(settings: &RelayConfig, tools_enabled: bool) -> Option<String> {
    let base = settings.system_prompt.as_deref().filter(|p| !p.trim().is_empty());
    if !tools_enabled {
        return base.map(str::to_owned);
    }

    let instruction = settings.tool_instruction.as_deref().unwrap_or(TOOL_INSTRUCTION);
    Some(match base {
        Some(base) => format!("{base}\n\n{instruction}"),
        None => instruction.to_owned(),
    })
}

impl NormalizedRequest {
    /// Resolve images and produce the message list for one upstream call
    ///
    /// A missing image on the new turn fails the turn; a missing image on an
    /// earlier turn is dropped with a warning.
    pub async fn to_messages(&self, upload_dir: &Path) -> Result<Vec<Message>, RelayError> {
        let mut messages = Vec::with_capacity(self.prior_turns.len() + 2);

        if let Some(prompt) = &self.system_prompt {
            messages.push(Message::system(prompt.clone()));
        }

        for turn in &self.prior_turns {
            let image = match &turn.image_ref {
                Some(image_ref) => match attachment::load_image(upload_dir, image_ref).await {
                    Ok(part) => Some(part),
                    Err(e) => {
                        tracing::warn!(image_ref = %image_ref, error = %e, "dropping unreadable image from history");
                        None
                    }
                },
                None => None,
            };
            messages.push(turn_message(turn, image));
        }

        let image = match &self.new_turn.image_ref {
            Some(image_ref) => Some(attachment::load_image(upload_dir, image_ref).await?),
            None => None,
        };
        messages.push(turn_message(&self.new_turn, image));

        Ok(messages)
    }
}

fn turn_message(turn: &Turn, image: Option<ContentPart>) -> Message {
    let content = match image {
        None => Content::Text(turn.text.clone()),
        Some(image) => {
            let mut parts = Vec::with_capacity(2);
            if !turn.text.is_empty() {
                parts.push(ContentPart::Text { text: turn.text.clone() });
            }
            parts.push(image);
            Content::Parts(parts)
        }
    };

    match turn.role {
        Role::Assistant => Message {
            content,
            ..Message::assistant(String::new())
        },
        _ => Message::user(content),
    }
}
