//! Provider-agnostic types
//!
//! Every dialect converts to and from these; the orchestrator never sees a
//! wire shape.

pub mod delta;
pub mod message;
pub mod request;
pub mod tool;

pub use delta::{DeltaFragment, FinishReason, ToolCallPiece};
pub use message::{Content, ContentPart, FunctionCall, Message, Role, ToolCall};
pub use request::CompletionRequest;
pub use tool::ToolDefinition;
