//! Inbound request contracts accepted by the relay

use serde::{Deserialize, Serialize};

/// Response header carrying the session a turn was recorded under
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// One chat turn against a single configured endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnRequest {
    /// Configured endpoint to relay to
    pub endpoint_id: String,
    /// Existing session, or `None` to start a new one
    #[serde(default)]
    pub session_id: Option<String>,
    /// New user message text
    #[serde(default)]
    pub message: String,
    /// Attached image, relative to the upload directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    /// Replay prior turns of the session to the model
    #[serde(default)]
    pub include_history: bool,
    /// Append the user and assistant turns to the transcript
    #[serde(default = "default_persist")]
    pub persist: bool,
    /// Offer the registered tools to the model
    #[serde(default)]
    pub tools_enabled: bool,
}

impl ChatTurnRequest {
    /// Minimal request for a text-only turn
    pub fn new(endpoint_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            session_id: None,
            message: message.into(),
            image_ref: None,
            include_history: false,
            persist: true,
            tools_enabled: false,
        }
    }
}

/// One image-generation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageTurnRequest {
    /// Configured image endpoint
    pub endpoint_id: String,
    /// Existing session, or `None` to start a new one
    #[serde(default)]
    pub session_id: Option<String>,
    /// Prompt describing the image
    pub prompt: String,
    /// Append the prompt and result to the transcript
    #[serde(default = "default_persist")]
    pub persist: bool,
}

const fn default_persist() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_defaults() {
        let request: ChatTurnRequest =
            serde_json::from_str(r#"{"endpointId":"gpt","sessionId":null,"message":"hi"}"#).unwrap();

        assert_eq!(request, ChatTurnRequest::new("gpt", "hi"));
    }

    #[test]
    fn chat_request_camel_case_fields() {
        let request: ChatTurnRequest = serde_json::from_str(
            r#"{"endpointId":"a","message":"m","imageRef":"cat.png","includeHistory":true,"persist":false,"toolsEnabled":true}"#,
        )
        .unwrap();

        assert_eq!(request.image_ref.as_deref(), Some("cat.png"));
        assert!(request.include_history);
        assert!(!request.persist);
        assert!(request.tools_enabled);
    }
}
