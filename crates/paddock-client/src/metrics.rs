//! Latency and throughput metrics for one turn

use std::time::{Duration, Instant};

use paddock_core::OutboundEvent;
use serde::Serialize;

/// Metrics derived for one pane
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    /// Time to first visible fragment as reported by the relay
    pub time_to_first_token_ms: Option<u64>,
    /// Time until the terminal event; never less than the TTFT
    pub end_to_end_latency_ms: Option<u64>,
    /// Time to the first answer fragment after a reasoning preamble
    pub first_answer_ms: Option<u64>,
    /// Estimated answer tokens (reasoning text is not counted)
    pub estimated_tokens: u32,
    /// Estimated answer tokens per second of generation
    pub tokens_per_second: Option<f64>,
}

/// Timestamps collected while a turn streams
#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    started: Instant,
    first_token_at: Option<Instant>,
    relay_ttft_ms: Option<u64>,
    first_answer_ms: Option<u64>,
    finished_at: Option<Instant>,
}

impl MetricsRecorder {
    /// Recorder for a turn sent at `started`
    pub const fn new(started: Instant) -> Self {
        Self {
            started,
            first_token_at: None,
            relay_ttft_ms: None,
            first_answer_ms: None,
            finished_at: None,
        }
    }

    /// Note an event that arrived at `at`
    pub fn observe(&mut self, event: &OutboundEvent, at: Instant) {
        if self.finished_at.is_some() {
            return;
        }

        match event {
            OutboundEvent::FirstTokenMarker { elapsed_ms } => {
                self.relay_ttft_ms.get_or_insert(*elapsed_ms);
                self.first_token_at.get_or_insert(at);
            }
            OutboundEvent::Metrics { first_answer_ms } => {
                self.first_answer_ms.get_or_insert(*first_answer_ms);
            }
            OutboundEvent::AnswerChunk { .. } | OutboundEvent::ThinkingChunk { .. } => {
                self.first_token_at.get_or_insert(at);
            }
            OutboundEvent::Done | OutboundEvent::Error { .. } => self.finish(at),
            OutboundEvent::ToolCallAnnounced { .. } | OutboundEvent::ToolResultAnnounced { .. } => {}
        }
    }

    /// Stop the clock at `at` unless it already stopped
    pub fn finish(&mut self, at: Instant) {
        self.finished_at.get_or_insert(at);
    }

    /// Metrics for the turn so far, given its answer text
    pub fn summarize(&self, answer_text: &str) -> PerformanceMetrics {
        let observed_ttft = self.first_token_at.map(|at| millis(at.saturating_duration_since(self.started)));
        let time_to_first_token_ms = self.relay_ttft_ms.or(observed_ttft);

        let end_to_end = self.finished_at.map(|at| at.saturating_duration_since(self.started));
        let end_to_end_latency_ms = end_to_end.map(|e2e| millis(e2e).max(time_to_first_token_ms.unwrap_or(0)));

        let estimated_tokens = estimate_tokens(answer_text);
        let tokens_per_second = end_to_end.and_then(|e2e| {
            let generation = self
                .first_token_at
                .zip(self.finished_at)
                .map(|(first, end)| end.saturating_duration_since(first))
                .filter(|window| !window.is_zero())
                .unwrap_or(e2e);
            rate(estimated_tokens, generation)
        });

        PerformanceMetrics {
            time_to_first_token_ms,
            end_to_end_latency_ms,
            first_answer_ms: self.first_answer_ms,
            estimated_tokens,
            tokens_per_second,
        }
    }
}

/// Roughly 1.3 tokens per whitespace-separated word, rounded up
pub fn estimate_tokens(text: &str) -> u32 {
    let words = u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX);
    words.saturating_mul(13).div_ceil(10)
}

fn rate(tokens: u32, window: Duration) -> Option<f64> {
    let seconds = window.as_secs_f64();
    (seconds > 0.0).then(|| f64::from(tokens) / seconds)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(text: &str) -> OutboundEvent {
        OutboundEvent::AnswerChunk { text: text.to_owned() }
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("one"), 2);
        assert_eq!(estimate_tokens("one two three four five six seven eight nine ten"), 13);
        assert_eq!(estimate_tokens("  spaced\n\tout  "), 3);
    }

    #[test]
    fn throughput_uses_the_generation_window() {
        let start = Instant::now();
        let mut recorder = MetricsRecorder::new(start);

        recorder.observe(&OutboundEvent::FirstTokenMarker { elapsed_ms: 500 }, start + Duration::from_millis(520));
        recorder.observe(
            &answer("one two three four five six seven eight nine ten"),
            start + Duration::from_millis(530),
        );
        recorder.observe(&OutboundEvent::Done, start + Duration::from_millis(2520));

        let metrics = recorder.summarize("one two three four five six seven eight nine ten");
        assert_eq!(metrics.time_to_first_token_ms, Some(500));
        assert_eq!(metrics.end_to_end_latency_ms, Some(2520));
        assert_eq!(metrics.estimated_tokens, 13);
        let tps = metrics.tokens_per_second.unwrap();
        assert!((tps - 6.5).abs() < 1e-9, "{tps}");
    }

    #[test]
    fn latency_never_undercuts_ttft() {
        let start = Instant::now();
        let mut recorder = MetricsRecorder::new(start);

        // Relay clock reports a later first token than the client measured
        recorder.observe(&OutboundEvent::FirstTokenMarker { elapsed_ms: 900 }, start + Duration::from_millis(10));
        recorder.observe(&OutboundEvent::Done, start + Duration::from_millis(20));

        let metrics = recorder.summarize("");
        assert_eq!(metrics.end_to_end_latency_ms, Some(900));
        assert!(metrics.time_to_first_token_ms <= metrics.end_to_end_latency_ms);
    }

    #[test]
    fn instant_finish_falls_back_to_whole_latency() {
        let start = Instant::now();
        let end = start + Duration::from_secs(2);
        let mut recorder = MetricsRecorder::new(start);

        recorder.observe(&answer("a b c d e f g h i j"), end);
        recorder.observe(&OutboundEvent::Done, end);

        let metrics = recorder.summarize("a b c d e f g h i j");
        assert_eq!(metrics.time_to_first_token_ms, Some(2000));
        let tps = metrics.tokens_per_second.unwrap();
        assert!((tps - 6.5).abs() < 1e-9, "{tps}");
    }

    #[test]
    fn unfinished_turn_has_no_latency() {
        let start = Instant::now();
        let mut recorder = MetricsRecorder::new(start);
        recorder.observe(&OutboundEvent::Metrics { first_answer_ms: 1200 }, start);

        let metrics = recorder.summarize("partial");
        assert_eq!(metrics.first_answer_ms, Some(1200));
        assert_eq!(metrics.end_to_end_latency_ms, None);
        assert_eq!(metrics.tokens_per_second, None);
    }

    #[test]
    fn thinking_text_is_not_counted() {
        let start = Instant::now();
        let mut recorder = MetricsRecorder::new(start);
        recorder.observe(
            &OutboundEvent::ThinkingChunk {
                text: "a very long deliberation".to_owned(),
            },
            start + Duration::from_millis(100),
        );
        recorder.observe(&OutboundEvent::Done, start + Duration::from_millis(1100));

        let metrics = recorder.summarize("");
        assert_eq!(metrics.estimated_tokens, 0);
        assert_eq!(metrics.tokens_per_second, Some(0.0));
    }
}
