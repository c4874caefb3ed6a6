//! Outbound line protocol
//!
//! Two families share one chunked HTTP body format:
//!
//! - text turns: `data: <json>` frames separated by a blank line, closed by
//!   `data: [DONE]` or an `ERROR: <message>` line
//! - media turns: bare `PROGRESS:`, `COMPLETE:` and `ERROR:` lines
//!
//! Encoding lives next to decoding so the relay and the client consumer
//! cannot drift apart.

use serde::{Deserialize, Serialize};

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";
const ERROR_PREFIX: &str = "ERROR:";
const PROGRESS_PREFIX: &str = "PROGRESS:";
const COMPLETE_PREFIX: &str = "COMPLETE:";

/// Which field of the reconstructed message a text fragment belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Intermediate model deliberation
    Thinking,
    /// Final answer text
    Answer,
}

/// Wire unit produced by the relay for one logical response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    /// Answer text fragment
    AnswerChunk { text: String },
    /// Reasoning text fragment
    ThinkingChunk { text: String },
    /// The model requested a tool call
    ToolCallAnnounced { name: String, arguments: String },
    /// A tool call finished executing
    ToolResultAnnounced { name: String, result: String },
    /// First visible fragment observed upstream
    FirstTokenMarker { elapsed_ms: u64 },
    /// First answer fragment after a thinking preamble
    Metrics { first_answer_ms: u64 },
    /// Terminal success
    Done,
    /// Terminal failure with a human-readable message
    Error { message: String },
}

impl OutboundEvent {
    /// Whether this event ends the turn
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }

    /// Render the event as one text-turn family frame
    pub fn to_line(&self) -> String {
        let payload = match self {
            Self::AnswerChunk { text } => chunk_payload(text, ContentType::Answer),
            Self::ThinkingChunk { text } => chunk_payload(text, ContentType::Thinking),
            Self::ToolCallAnnounced { name, arguments } => control_payload(&ControlPayload::ToolCall {
                name: name.clone(),
                arguments: arguments.clone(),
            }),
            Self::ToolResultAnnounced { name, result } => control_payload(&ControlPayload::ToolResult {
                name: name.clone(),
                result: result.clone(),
            }),
            Self::FirstTokenMarker { elapsed_ms } => {
                control_payload(&ControlPayload::BackendTtft { ttft: *elapsed_ms })
            }
            Self::Metrics { first_answer_ms } => control_payload(&ControlPayload::Metrics {
                first_answer_ms: *first_answer_ms,
            }),
            Self::Done => DONE_SENTINEL.to_owned(),
            Self::Error { message } => return error_line(message),
        };

        format!("{DATA_PREFIX} {payload}\n\n")
    }
}

/// Successful result of a media turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaResult {
    /// Text accompanying the media (e.g. the revised prompt)
    pub content: String,
    /// Path of the stored media, relative to the output directory
    pub image_path: String,
}

impl MediaResult {
    /// Render as a `COMPLETE:` line
    pub fn to_line(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_owned());
        format!("{COMPLETE_PREFIX}{json}\n")
    }
}

/// Render a media-family progress line
pub fn progress_line(text: &str) -> String {
    // Progress text is free-form but must stay on one line
    let flattened = text.replace(['\r', '\n'], " ");
    format!("{PROGRESS_PREFIX}{flattened}\n")
}

/// Render a terminal error line (shared by both families)
pub fn error_line(message: &str) -> String {
    let flattened = message.replace(['\r', '\n'], " ");
    format!("{ERROR_PREFIX} {flattened}\n")
}

/// One decoded line of either family
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireLine {
    /// Text-turn event (errors from both families land here)
    Event(OutboundEvent),
    /// Media-turn progress note
    Progress(String),
    /// Media-turn success
    Complete(MediaResult),
}

/// Decode a single protocol line
///
/// Returns `None` for blank lines, unknown prefixes and payloads that do
/// not match the vocabulary.
pub fn decode_line(line: &str) -> Option<WireLine> {
    let line = line.trim_end_matches(['\r', '\n']);

    if let Some(payload) = line.strip_prefix(DATA_PREFIX) {
        return decode_data(payload.trim_start()).map(WireLine::Event);
    }
    if let Some(message) = line.strip_prefix(ERROR_PREFIX) {
        return Some(WireLine::Event(OutboundEvent::Error {
            message: message.trim().to_owned(),
        }));
    }
    if let Some(text) = line.strip_prefix(PROGRESS_PREFIX) {
        return Some(WireLine::Progress(text.trim().to_owned()));
    }
    if let Some(json) = line.strip_prefix(COMPLETE_PREFIX) {
        return serde_json::from_str(json.trim()).ok().map(WireLine::Complete);
    }

    None
}

fn decode_data(payload: &str) -> Option<OutboundEvent> {
    if payload == DONE_SENTINEL {
        return Some(OutboundEvent::Done);
    }

    if let Ok(control) = serde_json::from_str::<ControlPayload>(payload) {
        return Some(match control {
            ControlPayload::BackendTtft { ttft } => OutboundEvent::FirstTokenMarker { elapsed_ms: ttft },
            ControlPayload::Metrics { first_answer_ms } => OutboundEvent::Metrics { first_answer_ms },
            ControlPayload::ToolCall { name, arguments } => OutboundEvent::ToolCallAnnounced { name, arguments },
            ControlPayload::ToolResult { name, result } => OutboundEvent::ToolResultAnnounced { name, result },
        });
    }

    let chunk = serde_json::from_str::<ChunkPayload>(payload).ok()?;
    let delta = chunk.choices.into_iter().next()?.delta;
    let text = delta.content;

    Some(match delta.content_type {
        ContentType::Thinking => OutboundEvent::ThinkingChunk { text },
        ContentType::Answer => OutboundEvent::AnswerChunk { text },
    })
}

// -- Payload shapes --

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ControlPayload {
    #[serde(rename = "BACKEND_TTFT")]
    BackendTtft { ttft: u64 },
    #[serde(rename = "METRICS")]
    Metrics { first_answer_ms: u64 },
    #[serde(rename = "TOOL_CALL")]
    ToolCall { name: String, arguments: String },
    #[serde(rename = "TOOL_RESULT")]
    ToolResult { name: String, result: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct ChunkPayload {
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChunkDelta {
    content: String,
    #[serde(rename = "contentType", default = "default_content_type")]
    content_type: ContentType,
}

const fn default_content_type() -> ContentType {
    ContentType::Answer
}

fn chunk_payload(text: &str, content_type: ContentType) -> String {
    let chunk = ChunkPayload {
        choices: vec![ChunkChoice {
            delta: ChunkDelta {
                content: text.to_owned(),
                content_type,
            },
        }],
    };
    serde_json::to_string(&chunk).unwrap_or_default()
}

fn control_payload(payload: &ControlPayload) -> String {
    serde_json::to_string(payload).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_chunk_frame() {
        let line = OutboundEvent::AnswerChunk { text: "hi".to_owned() }.to_line();
        insta::assert_snapshot!(line.trim_end(), @r#"data: {"choices":[{"delta":{"content":"hi","contentType":"answer"}}]}"#);
        assert!(line.ends_with("\n\n"));
    }

    #[test]
    fn ttft_frame_puts_type_first() {
        let line = OutboundEvent::FirstTokenMarker { elapsed_ms: 42 }.to_line();
        insta::assert_snapshot!(line.trim_end(), @r#"data: {"type":"BACKEND_TTFT","ttft":42}"#);
    }

    #[test]
    fn done_and_error_lines() {
        assert_eq!(OutboundEvent::Done.to_line(), "data: [DONE]\n\n");
        assert_eq!(
            OutboundEvent::Error {
                message: "boom\nagain".to_owned()
            }
            .to_line(),
            "ERROR: boom again\n"
        );
    }

    #[test]
    fn every_event_decodes_back() {
        let events = [
            OutboundEvent::AnswerChunk {
                text: "a \"quoted\" answer".to_owned(),
            },
            OutboundEvent::ThinkingChunk { text: "hmm".to_owned() },
            OutboundEvent::ToolCallAnnounced {
                name: "roll_dice".to_owned(),
                arguments: "{}".to_owned(),
            },
            OutboundEvent::ToolResultAnnounced {
                name: "roll_dice".to_owned(),
                result: "4".to_owned(),
            },
            OutboundEvent::FirstTokenMarker { elapsed_ms: 7 },
            OutboundEvent::Metrics { first_answer_ms: 9 },
            OutboundEvent::Done,
            OutboundEvent::Error {
                message: "🚦 Rate Limit Exceeded".to_owned(),
            },
        ];

        for event in events {
            let line = event.to_line();
            assert_eq!(decode_line(&line), Some(WireLine::Event(event)), "line: {line}");
        }
    }

    #[test]
    fn media_lines() {
        assert_eq!(
            decode_line(&progress_line("rendering\nstep 2")),
            Some(WireLine::Progress("rendering step 2".to_owned()))
        );

        let result = MediaResult {
            content: "a cat".to_owned(),
            image_path: "generated/cat.png".to_owned(),
        };
        assert_eq!(decode_line(&result.to_line()), Some(WireLine::Complete(result)));
        assert_eq!(
            decode_line("ERROR:no credits"),
            Some(WireLine::Event(OutboundEvent::Error {
                message: "no credits".to_owned()
            }))
        );
    }

    #[test]
    fn chunk_without_content_type_is_answer() {
        let decoded = decode_line(r#"data: {"choices":[{"delta":{"content":"x"}}]}"#);
        assert_eq!(
            decoded,
            Some(WireLine::Event(OutboundEvent::AnswerChunk { text: "x".to_owned() }))
        );
    }

    #[test]
    fn unknown_lines_are_ignored() {
        assert_eq!(decode_line(""), None);
        assert_eq!(decode_line(": keep-alive"), None);
        assert_eq!(decode_line("data: {\"unexpected\":true}"), None);
    }
}
