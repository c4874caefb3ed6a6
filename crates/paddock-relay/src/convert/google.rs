//! Google Generative Language conversion

use crate::convert::{non_empty, parse_payload};
use crate::error::RelayError;
use crate::protocol::google::{
    GoogleContent, GoogleFunctionCall, GoogleFunctionDeclaration, GoogleFunctionResponse, GoogleGenerationConfig,
    GoogleInlineData, GooglePart, GoogleRequest, GoogleResponse, GoogleTool,
};
use crate::types::{CompletionRequest, Content, ContentPart, DeltaFragment, FinishReason, Message, Role, ToolCallPiece};

// -- Outbound --

impl From<&CompletionRequest> for GoogleRequest {
    fn from(req: &CompletionRequest) -> Self {
        let mut system_instruction = None;
        let mut contents: Vec<GoogleContent> = Vec::new();

        for msg in &req.messages {
            let (role, parts) = match msg.role {
                Role::System => {
                    system_instruction = Some(GoogleContent {
                        role: None,
                        parts: vec![GooglePart::text(msg.content.as_text())],
                    });
                    continue;
                }
                Role::User => ("user", content_parts(&msg.content)),
                Role::Assistant => ("model", assistant_parts(msg)),
                Role::Tool => ("user", vec![function_response_part(msg)]),
            };

            match contents.last_mut() {
                Some(last) if last.role.as_deref() == Some(role) => last.parts.extend(parts),
                _ => contents.push(GoogleContent {
                    role: Some(role.to_owned()),
                    parts,
                }),
            }
        }

        let tools = req.tools.as_ref().map(|tools| {
            vec![GoogleTool {
                function_declarations: tools
                    .iter()
                    .map(|t| GoogleFunctionDeclaration {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.parameters.clone(),
                    })
                    .collect(),
            }]
        });

        Self {
            contents,
            system_instruction,
            generation_config: req
                .temperature
                .map(|temperature| GoogleGenerationConfig {
                    temperature: Some(temperature),
                }),
            tools,
        }
    }
}

fn content_parts(content: &Content) -> Vec<GooglePart> {
    match content {
        Content::Text(text) => vec![GooglePart::text(text.clone())],
        Content::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => GooglePart::text(text.clone()),
                ContentPart::Image { media_type, data } => GooglePart {
                    inline_data: Some(GoogleInlineData {
                        mime_type: media_type.clone(),
                        data: data.clone(),
                    }),
                    ..GooglePart::default()
                },
            })
            .collect(),
    }
}

fn assistant_parts(msg: &Message) -> Vec<GooglePart> {
    let mut parts = Vec::new();

    let text = msg.content.as_text();
    if !text.is_empty() {
        parts.push(GooglePart::text(text));
    }

    for tc in msg.tool_calls.iter().flatten() {
        let args = serde_json::from_str(&tc.function.arguments).unwrap_or_else(|_| serde_json::json!({}));
        parts.push(GooglePart {
            function_call: Some(GoogleFunctionCall {
                name: tc.function.name.clone(),
                args,
            }),
            ..GooglePart::default()
        });
    }

    parts
}

/// Google wants an object; bare results are wrapped as `{"result": ...}`
fn function_response_part(msg: &Message) -> GooglePart {
    let text = msg.content.as_text();
    let response = match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(value @ serde_json::Value::Object(_)) => value,
        Ok(value) => serde_json::json!({ "result": value }),
        Err(_) => serde_json::json!({ "result": text }),
    };

    GooglePart {
        function_response: Some(GoogleFunctionResponse {
            name: msg.name.clone().unwrap_or_default(),
            response,
        }),
        ..GooglePart::default()
    }
}

// -- Inbound --

/// Google sends whole function calls without indices; number them per round
#[derive(Debug, Default)]
pub struct GoogleStreamState {
    next_slot: u32,
}

impl GoogleStreamState {
    pub(crate) fn decode(&mut self, payload: &str) -> Result<Vec<DeltaFragment>, RelayError> {
        let response: GoogleResponse = parse_payload(payload)?;

        if let Some(error) = response.error {
            return Err(match error.status.as_deref() {
                Some(status) => RelayError::from_stream_error(status, error.message),
                None => RelayError::from_status(error.code, error.message),
            });
        }

        Ok(self.fragments(response))
    }

    fn fragments(&mut self, response: GoogleResponse) -> Vec<DeltaFragment> {
        let mut fragments = Vec::new();

        let Some(candidate) = response.candidates.into_iter().next() else {
            return fragments;
        };

        for part in candidate.content.parts {
            if let Some(text) = non_empty(part.text) {
                fragments.push(if part.thought == Some(true) {
                    DeltaFragment::Reasoning(text)
                } else {
                    DeltaFragment::Answer(text)
                });
            }

            if let Some(call) = part.function_call {
                let arguments = if call.args.is_null() {
                    None
                } else {
                    Some(call.args.to_string())
                };
                fragments.push(DeltaFragment::ToolCallPiece(ToolCallPiece {
                    index: self.next_slot,
                    id: None,
                    name: Some(call.name),
                    arguments,
                }));
                self.next_slot += 1;
            }
        }

        if let Some(reason) = candidate.finish_reason {
            fragments.push(DeltaFragment::Finish(FinishReason::from_wire(&reason)));
        }

        fragments
    }
}

/// Decode a blocking response body
pub(crate) fn decode_response(body: &str) -> Result<Vec<DeltaFragment>, RelayError> {
    GoogleStreamState::default().decode(body)
}
