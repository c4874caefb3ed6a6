use super::message::Message;
use super::tool::ToolDefinition;

/// One upstream round, before it is shaped for a dialect
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model identifier
    pub model: String,
    /// Conversation messages, system prompt first when present
    pub messages: Vec<Message>,
    /// Sampling temperature, already dropped for models that reject it
    pub temperature: Option<f64>,
    /// Token budget for dialects that require one
    pub max_tokens: u32,
    /// Tool definitions, only ever set on the first round
    pub tools: Option<Vec<ToolDefinition>>,
    /// Whether the response should be streamed
    pub stream: bool,
}
