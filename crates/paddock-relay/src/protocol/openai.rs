//! `OpenAI`-compatible chat completion wire format

use serde::{Deserialize, Serialize};

// -- Request types --

/// Body posted to `/chat/completions`
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiRequest {
    pub model: String,
    pub messages: Vec<OpenAiMessage>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Only ever sent as `true`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Tool definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<OpenAiTool>>,
}

/// One request turn
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiMessage {
    /// Message role
    pub role: &'static str,
    /// Absent on assistant turns that only carry tool calls
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<OpenAiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAiToolCall>>,
    /// Set on `tool` turns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Plain string, or parts when an image is attached
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OpenAiContent {
    Text(String),
    Parts(Vec<OpenAiContentPart>),
}

/// Multimodal user content
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpenAiContentPart {
    /// Text content
    Text {
        /// The text string
        text: String,
    },
    /// Image content via data URI
    ImageUrl {
        image_url: OpenAiImageUrl,
    },
}

/// Inline image reference
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiImageUrl {
    /// `data:<mime>;base64,<payload>`
    pub url: String,
}

/// Advertised tool
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiTool {
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    pub function: OpenAiFunction,
}

/// Name, description and parameter schema of an advertised tool
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiFunction {
    /// Function name
    pub name: String,
    pub description: String,
    /// JSON Schema object
    pub parameters: serde_json::Value,
}

/// Completed tool call, as replayed in history or returned single-shot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiToolCall {
    /// Empty when the provider omits it
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub tool_type: String,
    pub function: OpenAiFunctionCall,
}

fn function_type() -> String {
    "function".to_owned()
}

/// Called function
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiFunctionCall {
    /// Function name
    pub name: String,
    /// Arguments as a JSON string
    #[serde(default)]
    pub arguments: String,
}

// -- Response types --

/// Single-shot completion
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiResponse {
    #[serde(default)]
    pub choices: Vec<OpenAiChoice>,
}

/// One single-shot choice
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiChoice {
    pub message: OpenAiChoiceMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Assistant output of a single-shot choice
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiChoiceMessage {
    /// Text content
    #[serde(default)]
    pub content: Option<String>,
    /// Reasoning content (`DeepSeek`, vLLM and friends)
    #[serde(default, alias = "reasoning")]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<OpenAiToolCall>>,
}

// -- Streaming types --

/// One `data:` payload of a streamed completion
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiStreamChunk {
    #[serde(default)]
    pub choices: Vec<OpenAiStreamChoice>,
    /// Error reported mid-stream by some compatible servers
    #[serde(default)]
    pub error: Option<OpenAiStreamError>,
}

/// Error object inside a streamed chunk
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiStreamError {
    /// Error message
    pub message: String,
    /// Error type
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
}

/// Streamed choice
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiStreamChoice {
    #[serde(default)]
    pub delta: OpenAiStreamDelta,
    /// Set on the last chunk of a choice
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// What one chunk adds to a choice
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiStreamDelta {
    /// Answer text
    #[serde(default)]
    pub content: Option<String>,
    /// Incremental reasoning text
    #[serde(default)]
    pub reasoning_content: Option<String>,
    /// Incremental reasoning text under the shorter field name
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<OpenAiStreamToolCall>>,
}

/// Tool-call fragment, keyed by `index`
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiStreamToolCall {
    /// Slot the fragment belongs to
    #[serde(default)]
    pub index: u32,
    /// Only on the first fragment of a slot
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<OpenAiStreamFunctionCall>,
}

/// Name and argument pieces of a tool-call fragment
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiStreamFunctionCall {
    #[serde(default)]
    pub name: Option<String>,
    /// Appended to the slot's argument buffer
    #[serde(default)]
    pub arguments: Option<String>,
}
