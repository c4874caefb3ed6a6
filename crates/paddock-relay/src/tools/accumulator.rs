use std::collections::BTreeMap;

use serde_json::Value;

use crate::types::{FunctionCall, ToolCall, ToolCallPiece};

/// Outcome of trying to read accumulated argument text
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentsParse {
    /// The text is one whole JSON value
    Complete(Value),
    /// More fragments are needed (or the text will never parse)
    Incomplete,
}

/// Parse argument text without treating "not yet" as an error
///
/// Empty text is the empty object: providers send nothing for
/// zero-parameter functions.
pub fn try_parse_arguments(text: &str) -> ArgumentsParse {
    if text.trim().is_empty() {
        return ArgumentsParse::Complete(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(text).map_or(ArgumentsParse::Incomplete, ArgumentsParse::Complete)
}

/// A tool call ready to execute
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedToolCall {
    /// Call id echoed back with the result
    pub id: String,
    /// Function name
    pub name: String,
    /// Parsed arguments
    pub arguments: Value,
}

impl CompletedToolCall {
    /// Arguments normalised to compact JSON text
    pub fn arguments_text(&self) -> String {
        self.arguments.to_string()
    }

    /// Record for the assistant turn of the follow-up round
    pub fn to_tool_call(&self) -> ToolCall {
        ToolCall {
            id: self.id.clone(),
            function: FunctionCall {
                name: self.name.clone(),
                arguments: self.arguments_text(),
            },
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Per-round accumulation of streamed tool-call pieces, keyed by index
///
/// Slots only ever grow; nothing is reset until the round ends.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    slots: BTreeMap<u32, Slot>,
}

impl ToolCallAccumulator {
    /// Append one piece to its slot
    pub fn absorb(&mut self, piece: ToolCallPiece) {
        let slot = self.slots.entry(piece.index).or_default();
        if let Some(id) = piece.id
            && slot.id.is_none()
        {
            slot.id = Some(id);
        }
        if let Some(name) = piece.name {
            slot.name.push_str(&name);
        }
        if let Some(arguments) = piece.arguments {
            slot.arguments.push_str(&arguments);
        }
    }

    /// Whether the slot at `index` currently holds a whole call
    pub fn is_complete(&self, index: u32) -> bool {
        self.slots.get(&index).is_some_and(|slot| {
            !slot.name.is_empty() && matches!(try_parse_arguments(&slot.arguments), ArgumentsParse::Complete(_))
        })
    }

    /// Promote every complete slot, in index order; the rest are dropped
    pub fn complete(self) -> Vec<CompletedToolCall> {
        self.slots
            .into_iter()
            .filter_map(|(index, slot)| {
                if slot.name.is_empty() {
                    tracing::debug!(index, "dropping tool call without a name");
                    return None;
                }
                let ArgumentsParse::Complete(arguments) = try_parse_arguments(&slot.arguments) else {
                    tracing::debug!(index, name = %slot.name, "dropping tool call with incomplete arguments");
                    return None;
                };
                Some(CompletedToolCall {
                    id: slot.id.unwrap_or_else(|| format!("call_{index}")),
                    name: slot.name,
                    arguments,
                })
            })
            .collect()
    }
}
