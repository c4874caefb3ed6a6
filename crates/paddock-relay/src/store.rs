//! Storage collaborator
//!
//! Append-only transcripts keyed by session id. The relay touches a
//! session's transcript at most twice per turn: once before streaming and
//! once after the terminal event.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;

use crate::error::RelayError;
use crate::types::Role;

/// One persisted turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptRow {
    /// Author of the turn
    pub role: Role,
    /// Text as shown to the user
    pub text: String,
    /// Attached image, relative to the upload directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    /// When the row was written
    pub timestamp: jiff::Timestamp,
}

impl TranscriptRow {
    /// Row stamped with the current time
    pub fn now(role: Role, text: impl Into<String>, image_ref: Option<String>) -> Self {
        Self {
            role,
            text: text.into(),
            image_ref,
            timestamp: jiff::Timestamp::now(),
        }
    }
}

/// Where transcripts live
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Append a row; existing rows are never touched
    async fn append(&self, session_id: &str, row: TranscriptRow) -> Result<(), RelayError>;

    /// Every row of a session in the order written
    async fn history(&self, session_id: &str) -> Result<Vec<TranscriptRow>, RelayError>;
}

/// Process-local transcript store
#[derive(Debug, Default)]
pub struct MemoryTranscriptStore {
    sessions: DashMap<String, Vec<TranscriptRow>>,
}

impl MemoryTranscriptStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TranscriptStore for MemoryTranscriptStore {
    async fn append(&self, session_id: &str, row: TranscriptRow) -> Result<(), RelayError> {
        self.sessions.entry(session_id.to_owned()).or_default().push(row);
        Ok(())
    }

    async fn history(&self, session_id: &str) -> Result<Vec<TranscriptRow>, RelayError> {
        Ok(self
            .sessions
            .get(session_id)
            .map(|rows| rows.value().clone())
            .unwrap_or_default())
    }
}
