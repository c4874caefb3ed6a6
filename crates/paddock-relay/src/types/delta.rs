/// Smallest unit read off an upstream stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaFragment {
    /// Answer text
    Answer(String),
    /// Reasoning text
    Reasoning(String),
    /// Part of a tool call, addressed by its stream index
    ToolCallPiece(ToolCallPiece),
    /// Upstream reported why generation stopped
    Finish(FinishReason),
    /// End of the round
    Done,
    /// Line that could not be decoded; logged and skipped
    Malformed(String),
}

/// Fragment of a tool call
///
/// `name` and `arguments` are appended to whatever the slot at `index`
/// already holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallPiece {
    /// Stream-assigned slot index
    pub index: u32,
    /// Tool call ID (usually only on the first piece)
    pub id: Option<String>,
    /// Function name fragment
    pub name: Option<String>,
    /// Arguments JSON fragment
    pub arguments: Option<String>,
}

/// Reason the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// Natural end of generation
    Stop,
    /// Hit the token limit
    Length,
    /// Model decided to call a tool
    ToolCalls,
    /// Content was filtered by safety systems
    ContentFilter,
}

impl FinishReason {
    /// Map the finish/stop strings used by the supported dialects
    pub fn from_wire(reason: &str) -> Self {
        match reason {
            "length" | "max_tokens" | "MAX_TOKENS" => Self::Length,
            "tool_calls" | "tool_use" | "function_call" => Self::ToolCalls,
            "content_filter" | "SAFETY" | "RECITATION" | "refusal" => Self::ContentFilter,
            _ => Self::Stop,
        }
    }
}
