//! `OpenAI`-compatible conversion

use crate::convert::{non_empty, parse_payload};
use crate::error::RelayError;
use crate::protocol::openai::{
    OpenAiContent, OpenAiContentPart, OpenAiFunction, OpenAiFunctionCall, OpenAiImageUrl, OpenAiMessage,
    OpenAiRequest, OpenAiResponse, OpenAiStreamChunk, OpenAiTool, OpenAiToolCall,
};
use crate::types::{CompletionRequest, Content, ContentPart, DeltaFragment, FinishReason, Message, Role, ToolCallPiece};

/// Stream terminator
const DONE_SENTINEL: &str = "[DONE]";

// -- Outbound --

impl From<&CompletionRequest> for OpenAiRequest {
    fn from(req: &CompletionRequest) -> Self {
        Self {
            model: req.model.clone(),
            messages: req.messages.iter().map(Into::into).collect(),
            temperature: req.temperature,
            stream: req.stream.then_some(true),
            tools: req.tools.as_ref().map(|tools| {
                tools
                    .iter()
                    .map(|t| OpenAiTool {
                        tool_type: "function",
                        function: OpenAiFunction {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.parameters.clone(),
                        },
                    })
                    .collect()
            }),
        }
    }
}

impl From<&Message> for OpenAiMessage {
    fn from(msg: &Message) -> Self {
        let role = match msg.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };

        let content = match &msg.content {
            // An assistant tool-call turn with no text sends `null` content
            Content::Text(text) if text.is_empty() && msg.tool_calls.is_some() => None,
            Content::Text(text) => Some(OpenAiContent::Text(text.clone())),
            Content::Parts(parts) => Some(OpenAiContent::Parts(parts.iter().map(Into::into).collect())),
        };

        let tool_calls = msg.tool_calls.as_ref().map(|calls| {
            calls
                .iter()
                .map(|tc| OpenAiToolCall {
                    id: tc.id.clone(),
                    tool_type: "function".to_owned(),
                    function: OpenAiFunctionCall {
                        name: tc.function.name.clone(),
                        arguments: tc.function.arguments.clone(),
                    },
                })
                .collect()
        });

        Self {
            role,
            content,
            tool_calls,
            tool_call_id: msg.tool_call_id.clone(),
        }
    }
}

impl From<&ContentPart> for OpenAiContentPart {
    fn from(part: &ContentPart) -> Self {
        match part {
            ContentPart::Text { text } => Self::Text { text: text.clone() },
            ContentPart::Image { .. } => Self::ImageUrl {
                image_url: OpenAiImageUrl {
                    url: part.data_uri().unwrap_or_default(),
                },
            },
        }
    }
}

// -- Inbound --

/// Decode one streamed payload
pub(crate) fn decode_stream_payload(payload: &str, reasoning_field: bool) -> Result<Vec<DeltaFragment>, RelayError> {
    if payload == DONE_SENTINEL {
        return Ok(vec![DeltaFragment::Done]);
    }

    let chunk: OpenAiStreamChunk = parse_payload(payload)?;

    if let Some(error) = chunk.error {
        return Err(RelayError::from_stream_error(
            error.error_type.as_deref().unwrap_or_default(),
            error.message,
        ));
    }

    let mut fragments = Vec::new();

    for choice in chunk.choices {
        let delta = choice.delta;

        if reasoning_field && let Some(reasoning) = non_empty(delta.reasoning_content.or(delta.reasoning)) {
            fragments.push(DeltaFragment::Reasoning(reasoning));
        }

        if let Some(text) = non_empty(delta.content) {
            fragments.push(DeltaFragment::Answer(text));
        }

        for call in delta.tool_calls.into_iter().flatten() {
            let (name, arguments) = call.function.map_or((None, None), |f| (f.name, f.arguments));
            fragments.push(DeltaFragment::ToolCallPiece(ToolCallPiece {
                index: call.index,
                id: non_empty(call.id),
                name: non_empty(name),
                arguments: non_empty(arguments),
            }));
        }

        if let Some(reason) = choice.finish_reason {
            fragments.push(DeltaFragment::Finish(FinishReason::from_wire(&reason)));
        }
    }

    Ok(fragments)
}

/// Decode a blocking response body
pub(crate) fn decode_response(body: &str, reasoning_field: bool) -> Result<Vec<DeltaFragment>, RelayError> {
    let response: OpenAiResponse = parse_payload(body)?;
    let mut fragments = Vec::new();

    let Some(choice) = response.choices.into_iter().next() else {
        return Ok(fragments);
    };

    if reasoning_field && let Some(reasoning) = non_empty(choice.message.reasoning_content) {
        fragments.push(DeltaFragment::Reasoning(reasoning));
    }
    if let Some(text) = non_empty(choice.message.content) {
        fragments.push(DeltaFragment::Answer(text));
    }

    for (index, call) in (0u32..).zip(choice.message.tool_calls.into_iter().flatten()) {
        fragments.push(DeltaFragment::ToolCallPiece(ToolCallPiece {
            index,
            id: non_empty(Some(call.id)),
            name: Some(call.function.name),
            arguments: Some(call.function.arguments),
        }));
    }

    if let Some(reason) = choice.finish_reason {
        fragments.push(DeltaFragment::Finish(FinishReason::from_wire(&reason)));
    }

    Ok(fragments)
}
