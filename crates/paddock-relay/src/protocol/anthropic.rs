//! Anthropic Messages API wire format

use serde::{Deserialize, Serialize};

// -- Request types --

/// Messages API request
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicRequest {
    /// Model identifier
    pub model: String,
    /// Mandatory for this dialect
    pub max_tokens: u32,
    /// Lifted out of the message list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Conversation messages
    pub messages: Vec<AnthropicMessage>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Tool definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<AnthropicTool>>,
}

/// Message with a "user" or "assistant" role
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicMessage {
    /// Role
    pub role: &'static str,
    /// Content blocks
    pub content: AnthropicContent,
}

/// Content can be a string or array of content blocks
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AnthropicContent {
    /// Bare string content
    Text(String),
    /// Text, image or tool blocks
    Blocks(Vec<AnthropicContentBlock>),
}

/// Content block in a request message
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentBlock {
    /// Text content
    Text {
        /// The text string
        text: String,
    },
    /// Inline image
    Image {
        /// Image source
        source: AnthropicImageSource,
    },
    /// Assistant tool call
    ToolUse {
        /// Tool use identifier
        id: String,
        /// Tool name
        name: String,
        /// Tool input as JSON
        input: serde_json::Value,
    },
    /// Tool result sent back by the user
    ToolResult {
        /// Matches the `tool_use` block id
        tool_use_id: String,
        /// Result content
        content: String,
    },
}

/// Base64 image source
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicImageSource {
    /// Always "base64"
    #[serde(rename = "type")]
    pub source_type: &'static str,
    /// MIME type of the payload
    pub media_type: String,
    /// Base64-encoded bytes
    pub data: String,
}

/// Tool definition
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicTool {
    /// Tool name
    pub name: String,
    pub description: String,
    /// JSON Schema object
    pub input_schema: serde_json::Value,
}

// -- Response types --

/// Non-streaming response
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicResponse {
    #[serde(default)]
    pub content: Vec<AnthropicResponseBlock>,
    /// Stop reason
    #[serde(default)]
    pub stop_reason: Option<String>,
}

/// Content block in a response
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicResponseBlock {
    /// Text response
    Text {
        /// The text string
        text: String,
    },
    /// Extended thinking
    Thinking {
        /// Reasoning text
        thinking: String,
    },
    /// Tool use request
    ToolUse {
        /// Tool use identifier
        id: String,
        /// Tool name
        name: String,
        /// Tool input as JSON
        input: serde_json::Value,
    },
    /// Block types this relay does not handle
    #[serde(other)]
    Other,
}

// -- Streaming types --

/// SSE event payloads
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamEvent {
    /// Stream started
    MessageStart,
    /// Opens the block at `index`
    ContentBlockStart {
        /// Block index
        index: u32,
        /// Initial block content
        content_block: AnthropicStreamContentBlock,
    },
    /// Block delta
    ContentBlockDelta {
        /// Block index
        index: u32,
        /// Delta content
        delta: AnthropicStreamDelta,
    },
    /// End of the block at `index`
    ContentBlockStop,
    /// Message metadata delta (stop reason)
    MessageDelta {
        /// Carries the stop reason
        delta: AnthropicMessageDelta,
    },
    /// Stream completed
    MessageStop,
    /// Keep-alive
    Ping,
    /// In-stream failure
    Error {
        /// Error details
        error: AnthropicErrorDetail,
    },
    /// Event types added after this was written
    #[serde(other)]
    Unknown,
}

/// Block opened by `content_block_start`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamContentBlock {
    /// Tool use block
    ToolUse {
        /// Tool use ID
        id: String,
        /// Tool name
        name: String,
    },
    /// Text, thinking and other blocks carry nothing needed at start
    #[serde(other)]
    Other,
}

/// Payload of `content_block_delta`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamDelta {
    /// Incremental text
    TextDelta {
        /// Text fragment
        text: String,
    },
    /// Incremental reasoning
    ThinkingDelta {
        /// Reasoning fragment
        thinking: String,
    },
    /// Piece of the tool input JSON
    InputJsonDelta {
        /// JSON fragment
        partial_json: String,
    },
    /// Signature and other deltas are ignored
    #[serde(other)]
    Other,
}

/// Payload of `message_delta`
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicMessageDelta {
    /// Stop reason
    #[serde(default)]
    pub stop_reason: Option<String>,
}

/// Error detail
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicErrorDetail {
    /// Error type
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message
    pub message: String,
}
