use serde::{Deserialize, Serialize};

/// Role of a message participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction
    System,
    /// User message
    User,
    /// Assistant response
    Assistant,
    /// Tool/function result
    Tool,
}

/// Message in a conversation
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Role of the message author
    pub role: Role,
    /// Message content
    pub content: Content,
    /// Tool calls made by the assistant
    pub tool_calls: Option<Vec<ToolCall>>,
    /// ID of the tool call this message answers
    pub tool_call_id: Option<String>,
    /// Name of the function a tool message answers
    pub name: Option<String>,
}

impl Message {
    /// System instruction
    pub fn system(text: impl Into<String>) -> Self {
        Self::plain(Role::System, Content::Text(text.into()))
    }

    /// User turn with arbitrary content
    pub fn user(content: Content) -> Self {
        Self::plain(Role::User, content)
    }

    /// Plain-text assistant turn
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, Content::Text(text.into()))
    }

    /// Assistant turn that requested tool calls
    pub fn assistant_tool_calls(text: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(calls),
            ..Self::plain(Role::Assistant, Content::Text(text.into()))
        }
    }

    /// Result of one tool call
    pub fn tool_result(call_id: impl Into<String>, name: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            name: Some(name.into()),
            ..Self::plain(Role::Tool, Content::Text(result.into()))
        }
    }

    const fn plain(role: Role, content: Content) -> Self {
        Self {
            role,
            content,
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }
}

/// Message content, either plain text or a list of parts
///
/// Text-only turns stay `Text`; some providers reject a parts list that
/// holds nothing but text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Plain text content
    Text(String),
    /// Text and inline images
    Parts(Vec<ContentPart>),
}

impl Content {
    /// Extract text content, joining parts if necessary
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Image { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

/// Individual part within a multipart message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    /// Text content block
    Text {
        /// The text string
        text: String,
    },
    /// Inline image
    Image {
        /// MIME type inferred from the file extension
        media_type: String,
        /// Base64-encoded bytes
        data: String,
    },
}

impl ContentPart {
    /// Render an image part as a `data:` URI
    pub fn data_uri(&self) -> Option<String> {
        match self {
            Self::Image { media_type, data } => Some(format!("data:{media_type};base64,{data}")),
            Self::Text { .. } => None,
        }
    }
}

/// A tool/function call requested by the assistant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,
    /// Name and arguments of the function to call
    pub function: FunctionCall,
}

/// Function name and arguments within a tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Function name
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}
