//! Anthropic Messages conversion

use std::collections::HashMap;

use crate::convert::{non_empty, parse_payload};
use crate::error::RelayError;
use crate::protocol::anthropic::{
    AnthropicContent, AnthropicContentBlock, AnthropicImageSource, AnthropicMessage, AnthropicRequest,
    AnthropicResponse, AnthropicResponseBlock, AnthropicStreamContentBlock, AnthropicStreamDelta,
    AnthropicStreamEvent, AnthropicTool,
};
use crate::types::{CompletionRequest, Content, ContentPart, DeltaFragment, FinishReason, Message, Role, ToolCallPiece};

// -- Outbound --

impl From<&CompletionRequest> for AnthropicRequest {
    fn from(req: &CompletionRequest) -> Self {
        let mut system: Option<String> = None;
        let mut messages: Vec<AnthropicMessage> = Vec::new();

        for msg in &req.messages {
            if msg.role == Role::System {
                let text = msg.content.as_text();
                system = Some(match system {
                    Some(existing) => format!("{existing}\n\n{text}"),
                    None => text,
                });
            } else {
                push_merged(&mut messages, internal_message_to_anthropic(msg));
            }
        }

        let tools = req.tools.as_ref().map(|tools| {
            tools
                .iter()
                .map(|t| AnthropicTool {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    input_schema: t.parameters.clone(),
                })
                .collect()
        });

        Self {
            model: req.model.clone(),
            max_tokens: req.max_tokens,
            system,
            messages,
            temperature: req.temperature,
            stream: req.stream.then_some(true),
            tools,
        }
    }
}

/// Append, folding into the previous message when the role repeats
///
/// Several tool results in a row must reach Anthropic as one user turn.
fn push_merged(messages: &mut Vec<AnthropicMessage>, next: AnthropicMessage) {
    match messages.last_mut() {
        Some(last) if last.role == next.role => {
            let mut blocks = into_blocks(std::mem::replace(&mut last.content, AnthropicContent::Blocks(Vec::new())));
            blocks.extend(into_blocks(next.content));
            last.content = AnthropicContent::Blocks(blocks);
        }
        _ => messages.push(next),
    }
}

fn into_blocks(content: AnthropicContent) -> Vec<AnthropicContentBlock> {
    match content {
        AnthropicContent::Text(text) => vec![AnthropicContentBlock::Text { text }],
        AnthropicContent::Blocks(blocks) => blocks,
    }
}

fn internal_message_to_anthropic(msg: &Message) -> AnthropicMessage {
    if msg.role == Role::Tool {
        return AnthropicMessage {
            role: "user",
            content: AnthropicContent::Blocks(vec![AnthropicContentBlock::ToolResult {
                tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                content: msg.content.as_text(),
            }]),
        };
    }

    let role = if msg.role == Role::Assistant { "assistant" } else { "user" };

    if let Some(tool_calls) = &msg.tool_calls {
        let mut blocks = Vec::new();

        let text = msg.content.as_text();
        if !text.is_empty() {
            blocks.push(AnthropicContentBlock::Text { text });
        }

        for tc in tool_calls {
            let input = serde_json::from_str(&tc.function.arguments).unwrap_or_else(|_| serde_json::json!({}));
            blocks.push(AnthropicContentBlock::ToolUse {
                id: tc.id.clone(),
                name: tc.function.name.clone(),
                input,
            });
        }

        return AnthropicMessage {
            role,
            content: AnthropicContent::Blocks(blocks),
        };
    }

    let content = match &msg.content {
        Content::Text(text) => AnthropicContent::Text(text.clone()),
        Content::Parts(parts) => AnthropicContent::Blocks(
            parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => AnthropicContentBlock::Text { text: text.clone() },
                    ContentPart::Image { media_type, data } => AnthropicContentBlock::Image {
                        source: AnthropicImageSource {
                            source_type: "base64",
                            media_type: media_type.clone(),
                            data: data.clone(),
                        },
                    },
                })
                .collect(),
        ),
    };

    AnthropicMessage { role, content }
}

// -- Inbound --

/// Tracks which content blocks are tool calls
///
/// Anthropic indexes content blocks, not tool calls; tool blocks get their
/// own sequential slot so the accumulator sees 0, 1, 2...
#[derive(Debug, Default)]
pub struct AnthropicStreamState {
    tool_slots: HashMap<u32, u32>,
    next_slot: u32,
}

impl AnthropicStreamState {
    pub(crate) fn decode(&mut self, payload: &str) -> Result<Vec<DeltaFragment>, RelayError> {
        let event: AnthropicStreamEvent = parse_payload(payload)?;

        let fragments = match event {
            AnthropicStreamEvent::ContentBlockStart {
                index,
                content_block: AnthropicStreamContentBlock::ToolUse { id, name },
            } => {
                let slot = self.next_slot;
                self.next_slot += 1;
                self.tool_slots.insert(index, slot);
                vec![DeltaFragment::ToolCallPiece(ToolCallPiece {
                    index: slot,
                    id: Some(id),
                    name: Some(name),
                    arguments: None,
                })]
            }
            AnthropicStreamEvent::ContentBlockDelta { index, delta } => match delta {
                AnthropicStreamDelta::TextDelta { text } => {
                    non_empty(Some(text)).map(DeltaFragment::Answer).into_iter().collect()
                }
                AnthropicStreamDelta::ThinkingDelta { thinking } => {
                    non_empty(Some(thinking)).map(DeltaFragment::Reasoning).into_iter().collect()
                }
                AnthropicStreamDelta::InputJsonDelta { partial_json } => match self.tool_slots.get(&index) {
                    Some(&slot) => vec![DeltaFragment::ToolCallPiece(ToolCallPiece {
                        index: slot,
                        arguments: non_empty(Some(partial_json)),
                        ..ToolCallPiece::default()
                    })],
                    None => vec![DeltaFragment::Malformed(format!(
                        "input_json_delta for block {index} without tool_use start"
                    ))],
                },
                AnthropicStreamDelta::Other => Vec::new(),
            },
            AnthropicStreamEvent::MessageDelta { delta } => delta
                .stop_reason
                .map(|reason| DeltaFragment::Finish(FinishReason::from_wire(&reason)))
                .into_iter()
                .collect(),
            AnthropicStreamEvent::MessageStop => vec![DeltaFragment::Done],
            AnthropicStreamEvent::Error { error } => {
                return Err(RelayError::from_stream_error(&error.error_type, error.message));
            }
            AnthropicStreamEvent::ContentBlockStart { .. }
            | AnthropicStreamEvent::MessageStart
            | AnthropicStreamEvent::ContentBlockStop
            | AnthropicStreamEvent::Ping
            | AnthropicStreamEvent::Unknown => Vec::new(),
        };

        Ok(fragments)
    }
}

/// Decode a blocking response body
pub(crate) fn decode_response(body: &str) -> Result<Vec<DeltaFragment>, RelayError> {
    let response: AnthropicResponse = parse_payload(body)?;
    let mut fragments = Vec::new();
    let mut slot = 0u32;

    for block in response.content {
        match block {
            AnthropicResponseBlock::Text { text } => {
                fragments.extend(non_empty(Some(text)).map(DeltaFragment::Answer));
            }
            AnthropicResponseBlock::Thinking { thinking } => {
                fragments.extend(non_empty(Some(thinking)).map(DeltaFragment::Reasoning));
            }
            AnthropicResponseBlock::ToolUse { id, name, input } => {
                fragments.push(DeltaFragment::ToolCallPiece(ToolCallPiece {
                    index: slot,
                    id: Some(id),
                    name: Some(name),
                    arguments: Some(input.to_string()),
                }));
                slot += 1;
            }
            AnthropicResponseBlock::Other => {}
        }
    }

    if let Some(reason) = response.stop_reason {
        fragments.push(DeltaFragment::Finish(FinishReason::from_wire(&reason)));
    }

    Ok(fragments)
}
