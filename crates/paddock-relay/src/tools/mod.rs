//! Locally executed tools offered to the model

mod accumulator;
mod builtin;

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

pub use accumulator::{ArgumentsParse, CompletedToolCall, ToolCallAccumulator, try_parse_arguments};
pub use builtin::{CurrentTime, RollDice};

use crate::error::RelayError;
use crate::types::ToolDefinition;

/// Failure inside a tool; reported to the model as text, never to the consumer
#[derive(Debug, Error)]
pub enum ToolError {
    /// Arguments did not match the tool's schema
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    /// The tool ran but could not produce a result
    #[error("{0}")]
    Failed(String),
}

/// A function the model may call
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and JSON schema advertised upstream
    fn definition(&self) -> ToolDefinition;

    /// Run with parsed arguments and return plain text
    async fn call(&self, arguments: Value) -> Result<String, ToolError>;
}

/// Tools available to every session, by name
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    /// Registry holding the built-in tools
    pub fn with_builtins() -> Self {
        let mut registry = Self::default();
        registry.register(CurrentTime);
        registry.register(RollDice);
        registry
    }

    /// Add a tool, replacing any tool of the same name
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.definition().name;
        self.tools.insert(name, Arc::new(tool));
    }

    /// Definitions to attach to a first-round request
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    /// Whether any tool is registered
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Find a tool by name
    pub fn lookup(&self, name: &str) -> Result<&Arc<dyn Tool>, RelayError> {
        self.tools
            .get(name)
            .ok_or_else(|| RelayError::UnknownTool(name.to_owned()))
    }

    /// Run a completed call and capture its result as text
    ///
    /// Unknown tools and tool failures become textual results so one bad
    /// call never ends the turn.
    pub async fn execute(&self, call: &CompletedToolCall) -> String {
        let tool = match self.lookup(&call.name) {
            Ok(tool) => tool,
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "model requested an unregistered tool");
                return serde_json::json!({ "error": "unknown tool", "name": call.name }).to_string();
            }
        };

        match tool.call(call.arguments.clone()).await {
            Ok(result) => {
                tracing::debug!(tool = %call.name, "tool call succeeded");
                result
            }
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "tool call failed");
                format!("Tool execution failed: {e}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct Broken;

    #[async_trait]
    impl Tool for Broken {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "broken".to_owned(),
                description: "Always fails".to_owned(),
                parameters: json!({"type": "object", "properties": {}}),
            }
        }

        async fn call(&self, _arguments: Value) -> Result<String, ToolError> {
            Err(ToolError::Failed("disk on fire".to_owned()))
        }
    }

    fn call(name: &str, arguments: Value) -> CompletedToolCall {
        CompletedToolCall {
            id: "call_0".to_owned(),
            name: name.to_owned(),
            arguments,
        }
    }

    #[test]
    fn builtins_are_advertised_in_order() {
        let names: Vec<_> = ToolRegistry::with_builtins()
            .definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, ["get_current_time", "roll_dice"]);
    }

    #[tokio::test]
    async fn unknown_tool_is_a_structured_result() {
        let registry = ToolRegistry::with_builtins();
        assert!(matches!(registry.lookup("teleport"), Err(RelayError::UnknownTool(_))));

        let result = registry.execute(&call("teleport", json!({}))).await;
        let parsed: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed, json!({"error": "unknown tool", "name": "teleport"}));
    }

    #[tokio::test]
    async fn failure_is_reported_as_text() {
        let mut registry = ToolRegistry::default();
        registry.register(Broken);
        let result = registry.execute(&call("broken", json!({}))).await;
        assert_eq!(result, "Tool execution failed: disk on fire");
    }

    #[tokio::test]
    async fn invalid_arguments_are_reported_as_text() {
        let registry = ToolRegistry::with_builtins();
        let result = registry.execute(&call("roll_dice", json!({"sides": 1}))).await;
        assert!(result.starts_with("Tool execution failed: invalid arguments"), "{result}");
    }
}
