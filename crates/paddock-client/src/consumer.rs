//! Incremental reader for the relay's line protocol

use std::time::Instant;

use paddock_core::{OutboundEvent, WireLine, decode_line};

use crate::message::ReconstructedMessage;
use crate::metrics::{MetricsRecorder, PerformanceMetrics};

/// Reassembles protocol lines from arbitrarily split body chunks
#[derive(Debug, Default)]
pub struct LineAssembler {
    buffer: Vec<u8>,
}

impl LineAssembler {
    /// Append bytes and decode every line they complete
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<WireLine> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            if let Some(line) = decode_line(&String::from_utf8_lossy(&raw)) {
                lines.push(line);
            }
        }
        lines
    }

    /// Decode a trailing line that never got its newline
    pub fn finish(&mut self) -> Option<WireLine> {
        let raw = std::mem::take(&mut self.buffer);
        decode_line(&String::from_utf8_lossy(&raw))
    }
}

/// Consumer for one text turn
///
/// Fed raw body bytes together with the instant they arrived, so timings
/// can be replayed deterministically.
#[derive(Debug)]
pub struct StreamConsumer {
    lines: LineAssembler,
    message: ReconstructedMessage,
    metrics: MetricsRecorder,
}

impl StreamConsumer {
    /// Consumer for a turn sent at `started`
    pub fn new(started: Instant) -> Self {
        Self {
            lines: LineAssembler::default(),
            message: ReconstructedMessage::default(),
            metrics: MetricsRecorder::new(started),
        }
    }

    /// Apply a body chunk; returns whether the message changed
    pub fn feed(&mut self, bytes: &[u8], at: Instant) -> bool {
        let mut changed = false;
        for line in self.lines.feed(bytes) {
            changed |= self.apply(&line, at);
        }
        changed
    }

    /// The body ended; an unterminated turn is marked failed
    pub fn finish(&mut self, at: Instant) {
        if let Some(line) = self.lines.finish() {
            self.apply(&line, at);
        }
        if !self.message.is_finished() {
            self.abort("Connection closed before the response finished", at);
        }
    }

    /// Fail the turn locally, e.g. when the caller gives up waiting
    pub fn abort(&mut self, message: impl Into<String>, at: Instant) {
        self.message.fail(message.into());
        self.metrics.finish(at);
    }

    /// Whether `Done` or `Error` has been applied
    pub const fn is_finished(&self) -> bool {
        self.message.is_finished()
    }

    /// Message reconstructed so far
    pub const fn message(&self) -> &ReconstructedMessage {
        &self.message
    }

    /// Metrics for the turn so far
    pub fn metrics(&self) -> PerformanceMetrics {
        self.metrics.summarize(if self.message.is_error { "" } else { &self.message.answer_text })
    }

    fn apply(&mut self, line: &WireLine, at: Instant) -> bool {
        let WireLine::Event(event) = line else {
            return false;
        };
        if self.message.is_finished() {
            return false;
        }

        self.metrics.observe(event, at);
        let changed = self.message.apply(event);
        matches!(event, OutboundEvent::FirstTokenMarker { .. } | OutboundEvent::Metrics { .. }) || changed
    }
}
