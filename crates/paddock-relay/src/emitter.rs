//! Protocol emitter
//!
//! Serialises one turn's deltas into [`OutboundEvent`]s on the session
//! channel. It owns the per-turn markers: a single `FirstTokenMarker`, a
//! single `Metrics` after a thinking preamble, and a single terminal event.

use paddock_core::OutboundEvent;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::RelayError;

/// Writer for one turn's event stream
#[derive(Debug)]
pub struct Emitter {
    tx: mpsc::Sender<OutboundEvent>,
    started: Instant,
    first_token_sent: bool,
    thinking_first: bool,
    metrics_sent: bool,
    terminated: bool,
    answer: String,
}

impl Emitter {
    /// Emitter whose timings are measured from `started`
    pub fn new(tx: mpsc::Sender<OutboundEvent>, started: Instant) -> Self {
        Self {
            tx,
            started,
            first_token_sent: false,
            thinking_first: false,
            metrics_sent: false,
            terminated: false,
            answer: String::new(),
        }
    }

    /// Relay answer text
    pub async fn answer(&mut self, text: &str) -> Result<(), RelayError> {
        if text.is_empty() || self.terminated {
            return Ok(());
        }
        self.mark_first_token(false).await?;

        if self.thinking_first && !self.metrics_sent {
            self.metrics_sent = true;
            let first_answer_ms = self.elapsed_ms();
            self.send(OutboundEvent::Metrics { first_answer_ms }).await?;
        }

        self.answer.push_str(text);
        self.send(OutboundEvent::AnswerChunk { text: text.to_owned() }).await
    }

    /// Relay reasoning text
    pub async fn thinking(&mut self, text: &str) -> Result<(), RelayError> {
        if text.is_empty() || self.terminated {
            return Ok(());
        }
        self.mark_first_token(true).await?;
        self.send(OutboundEvent::ThinkingChunk { text: text.to_owned() }).await
    }

    /// Announce a tool call about to run
    pub async fn tool_call(&mut self, name: &str, arguments: &str) -> Result<(), RelayError> {
        self.send(OutboundEvent::ToolCallAnnounced {
            name: name.to_owned(),
            arguments: arguments.to_owned(),
        })
        .await
    }

    /// Announce a tool call's result
    pub async fn tool_result(&mut self, name: &str, result: &str) -> Result<(), RelayError> {
        self.send(OutboundEvent::ToolResultAnnounced {
            name: name.to_owned(),
            result: result.to_owned(),
        })
        .await
    }

    /// End the turn successfully
    pub async fn done(&mut self) -> Result<(), RelayError> {
        self.finish(OutboundEvent::Done).await
    }

    /// End the turn with a human-readable failure
    pub async fn error(&mut self, message: impl Into<String>) -> Result<(), RelayError> {
        self.finish(OutboundEvent::Error {
            message: message.into(),
        })
        .await
    }

    /// Answer text relayed so far
    pub fn answer_text(&self) -> &str {
        &self.answer
    }

    /// Whether a terminal event was sent
    pub const fn is_terminated(&self) -> bool {
        self.terminated
    }

    async fn mark_first_token(&mut self, thinking: bool) -> Result<(), RelayError> {
        if self.first_token_sent {
            return Ok(());
        }
        self.first_token_sent = true;
        self.thinking_first = thinking;
        let elapsed_ms = self.elapsed_ms();
        self.send(OutboundEvent::FirstTokenMarker { elapsed_ms }).await
    }

    async fn finish(&mut self, event: OutboundEvent) -> Result<(), RelayError> {
        if self.terminated {
            return Ok(());
        }
        self.terminated = true;
        self.tx.send(event).await.map_err(|_| RelayError::ClientGone)
    }

    async fn send(&self, event: OutboundEvent) -> Result<(), RelayError> {
        if self.terminated {
            return Ok(());
        }
        self.tx.send(event).await.map_err(|_| RelayError::ClientGone)
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn drain(mut rx: mpsc::Receiver<OutboundEvent>) -> Vec<OutboundEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn markers_are_emitted_once_in_order() {
        let (tx, rx) = mpsc::channel(32);
        let mut emitter = Emitter::new(tx, Instant::now());

        emitter.answer("").await.unwrap();
        tokio::time::advance(Duration::from_millis(40)).await;
        emitter.thinking("hmm").await.unwrap();
        emitter.thinking(" ok").await.unwrap();
        tokio::time::advance(Duration::from_millis(60)).await;
        emitter.answer("Hi").await.unwrap();
        emitter.answer(" there").await.unwrap();
        emitter.done().await.unwrap();
        emitter.error("late").await.unwrap();
        emitter.answer("ignored").await.unwrap();
        assert_eq!(emitter.answer_text(), "Hi there");
        drop(emitter);

        assert_eq!(drain(rx).await, vec![
            OutboundEvent::FirstTokenMarker { elapsed_ms: 40 },
            OutboundEvent::ThinkingChunk { text: "hmm".to_owned() },
            OutboundEvent::ThinkingChunk { text: " ok".to_owned() },
            OutboundEvent::Metrics { first_answer_ms: 100 },
            OutboundEvent::AnswerChunk { text: "Hi".to_owned() },
            OutboundEvent::AnswerChunk {
                text: " there".to_owned()
            },
            OutboundEvent::Done,
        ]);
    }

    #[tokio::test]
    async fn no_metrics_without_thinking_preamble() {
        let (tx, rx) = mpsc::channel(32);
        let mut emitter = Emitter::new(tx, Instant::now());
        emitter.answer("a").await.unwrap();
        emitter.thinking("b").await.unwrap();
        emitter.answer("c").await.unwrap();
        emitter.error("boom").await.unwrap();
        emitter.done().await.unwrap();
        drop(emitter);

        let events = drain(rx).await;
        assert!(!events.iter().any(|e| matches!(e, OutboundEvent::Metrics { .. })));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert_eq!(events.last(), Some(&OutboundEvent::Error {
            message: "boom".to_owned()
        }));
    }

    #[tokio::test]
    async fn closed_channel_means_client_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let mut emitter = Emitter::new(tx, Instant::now());
        assert!(matches!(emitter.answer("x").await, Err(RelayError::ClientGone)));
    }
}
