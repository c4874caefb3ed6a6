//! Streaming completion relay for Paddock
//!
//! Normalizes a chat turn, relays it to one configured upstream endpoint
//! (`OpenAI`-compatible, Anthropic or Google), splits the stream into
//! reasoning and answer text, runs at most one tool follow-up round, and
//! re-emits everything as one uniform line protocol.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod attachment;
pub mod convert;
pub mod emitter;
pub mod error;
pub mod handler;
pub mod images;
pub mod normalize;
pub mod orchestrator;
pub mod parser;
pub mod protocol;
pub mod session;
pub mod state;
pub mod store;
pub mod target;
pub mod tools;
pub mod types;
pub mod upstream;

pub use error::RelayError;
pub use handler::relay_router;
pub use state::RelayState;
pub use store::{MemoryTranscriptStore, TranscriptRow, TranscriptStore};
pub use target::{Capabilities, Dialect, EndpointRegistry, ProviderTarget};
pub use tools::{Tool, ToolRegistry};
pub use upstream::{HttpUpstream, Upstream};
