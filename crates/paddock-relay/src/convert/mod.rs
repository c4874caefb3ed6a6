//! Conversion between internal types and dialect wire formats
//!
//! Outbound: [`CompletionRequest`] to a JSON payload. Inbound: one SSE
//! `data:` payload (or a whole blocking response) to [`DeltaFragment`]s.

pub mod anthropic;
pub mod google;
pub mod openai;

use crate::error::RelayError;
use crate::protocol::{anthropic::AnthropicRequest, google::GoogleRequest, openai::OpenAiRequest};
use crate::target::{Capabilities, Dialect};
use crate::types::{CompletionRequest, DeltaFragment};

/// Characters of an undecodable payload kept for logging
const EXCERPT_CHARS: usize = 120;

/// Shape a request for `dialect`
///
/// # Errors
///
/// Returns `RelayError::Internal` if the payload cannot be serialized
pub fn encode_request(dialect: Dialect, request: &CompletionRequest) -> Result<serde_json::Value, RelayError> {
    let value = match dialect {
        Dialect::OpenAi => serde_json::to_value(OpenAiRequest::from(request)),
        Dialect::Anthropic => serde_json::to_value(AnthropicRequest::from(request)),
        Dialect::Google => serde_json::to_value(GoogleRequest::from(request)),
    };
    value.map_err(|e| RelayError::Internal(format!("failed to encode {dialect:?} request: {e}")))
}

/// Decode a blocking (non-streamed) response body into fragments ending in `Done`
///
/// # Errors
///
/// Returns `RelayError::MalformedChunk` if the body does not parse, or the
/// mapped upstream error if the body reports one
pub fn decode_response(
    dialect: Dialect,
    capabilities: &Capabilities,
    body: &str,
) -> Result<Vec<DeltaFragment>, RelayError> {
    let mut fragments = match dialect {
        Dialect::OpenAi => openai::decode_response(body, capabilities.reasoning_field)?,
        Dialect::Anthropic => anthropic::decode_response(body)?,
        Dialect::Google => google::decode_response(body)?,
    };
    fragments.push(DeltaFragment::Done);
    Ok(fragments)
}

/// Per-round stateful decoder for streamed payloads
#[derive(Debug)]
pub enum ChunkDecoder {
    /// `OpenAI`-compatible chunks
    OpenAi {
        /// Whether reasoning fields are read
        reasoning_field: bool,
    },
    /// Anthropic events
    Anthropic(anthropic::AnthropicStreamState),
    /// Google responses
    Google(google::GoogleStreamState),
}

impl ChunkDecoder {
    /// Fresh decoder for one round against a target
    pub fn new(dialect: Dialect, capabilities: &Capabilities) -> Self {
        match dialect {
            Dialect::OpenAi => Self::OpenAi {
                reasoning_field: capabilities.reasoning_field,
            },
            Dialect::Anthropic => Self::Anthropic(anthropic::AnthropicStreamState::default()),
            Dialect::Google => Self::Google(google::GoogleStreamState::default()),
        }
    }

    /// Decode one `data:` payload
    ///
    /// # Errors
    ///
    /// `RelayError::MalformedChunk` for payloads that do not parse (the
    /// caller skips them); any other variant is an error the upstream
    /// reported in-stream
    pub fn decode(&mut self, payload: &str) -> Result<Vec<DeltaFragment>, RelayError> {
        match self {
            Self::OpenAi { reasoning_field } => openai::decode_stream_payload(payload, *reasoning_field),
            Self::Anthropic(state) => state.decode(payload),
            Self::Google(state) => state.decode(payload),
        }
    }
}

/// Parse JSON, turning failure into a `MalformedChunk` with a short excerpt
pub(crate) fn parse_payload<T: serde::de::DeserializeOwned>(payload: &str) -> Result<T, RelayError> {
    serde_json::from_str(payload).map_err(|e| RelayError::MalformedChunk(format!("{e}: {}", excerpt(payload))))
}

fn excerpt(payload: &str) -> &str {
    payload
        .char_indices()
        .nth(EXCERPT_CHARS)
        .map_or(payload, |(cut, _)| &payload[..cut])
}

/// Keep a text fragment only when it carries something
pub(crate) fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.is_empty())
}
