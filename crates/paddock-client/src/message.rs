//! Per-pane message rebuilt from the event stream

use paddock_core::OutboundEvent;
use serde::Serialize;

/// A tool call the relay announced during the turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolActivity {
    /// Function name
    pub name: String,
    /// Arguments as JSON text
    pub arguments: String,
    /// Result text once the relay reports it
    pub result: Option<String>,
}

/// Message being reconstructed for one pane
///
/// Text is only ever appended; once `Done` or `Error` arrives the message
/// is frozen and later events are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconstructedMessage {
    /// Answer text, or the error text for a failed turn
    pub answer_text: String,
    /// Reasoning text
    pub thinking_text: String,
    /// Announced tool calls in order
    pub tools: Vec<ToolActivity>,
    /// Still receiving events
    pub is_streaming: bool,
    /// Ended with an error
    pub is_error: bool,
}

impl Default for ReconstructedMessage {
    fn default() -> Self {
        Self {
            answer_text: String::new(),
            thinking_text: String::new(),
            tools: Vec::new(),
            is_streaming: true,
            is_error: false,
        }
    }
}

impl ReconstructedMessage {
    /// Apply one event; returns whether the message changed
    pub fn apply(&mut self, event: &OutboundEvent) -> bool {
        if !self.is_streaming {
            return false;
        }

        match event {
            OutboundEvent::AnswerChunk { text } => self.answer_text.push_str(text),
            OutboundEvent::ThinkingChunk { text } => self.thinking_text.push_str(text),
            OutboundEvent::ToolCallAnnounced { name, arguments } => self.tools.push(ToolActivity {
                name: name.clone(),
                arguments: arguments.clone(),
                result: None,
            }),
            OutboundEvent::ToolResultAnnounced { name, result } => {
                // Results pair with the oldest unanswered call of that name
                match self.tools.iter_mut().find(|t| t.name == *name && t.result.is_none()) {
                    Some(activity) => activity.result = Some(result.clone()),
                    None => self.tools.push(ToolActivity {
                        name: name.clone(),
                        arguments: String::new(),
                        result: Some(result.clone()),
                    }),
                }
            }
            OutboundEvent::Done => self.is_streaming = false,
            OutboundEvent::Error { message } => self.fail(message.clone()),
            OutboundEvent::FirstTokenMarker { .. } | OutboundEvent::Metrics { .. } => return false,
        }

        true
    }

    /// Freeze the message as failed with `message` as its content
    pub fn fail(&mut self, message: String) {
        if !self.is_streaming {
            return;
        }
        self.answer_text = message;
        self.is_streaming = false;
        self.is_error = true;
    }

    /// Whether a terminal event has been applied
    pub const fn is_finished(&self) -> bool {
        !self.is_streaming
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(text: &str) -> OutboundEvent {
        OutboundEvent::AnswerChunk { text: text.to_owned() }
    }

    #[test]
    fn text_lands_in_its_field() {
        let mut message = ReconstructedMessage::default();
        message.apply(&OutboundEvent::ThinkingChunk { text: "hmm ".to_owned() });
        message.apply(&OutboundEvent::ThinkingChunk { text: "ok".to_owned() });
        message.apply(&answer("Hi"));
        message.apply(&answer(" there"));

        assert_eq!(message.thinking_text, "hmm ok");
        assert_eq!(message.answer_text, "Hi there");
        assert!(message.is_streaming);
    }

    #[test]
    fn done_freezes_the_message() {
        let mut message = ReconstructedMessage::default();
        message.apply(&answer("final"));
        assert!(message.apply(&OutboundEvent::Done));

        assert!(!message.apply(&answer(" extra")));
        assert!(!message.apply(&OutboundEvent::Error {
            message: "late".to_owned()
        }));
        assert_eq!(message.answer_text, "final");
        assert!(!message.is_error);
    }

    #[test]
    fn error_replaces_content() {
        let mut message = ReconstructedMessage::default();
        message.apply(&answer("partial"));
        message.apply(&OutboundEvent::Error {
            message: "🚦 Rate Limit Exceeded".to_owned(),
        });

        assert_eq!(message.answer_text, "🚦 Rate Limit Exceeded");
        assert!(message.is_error);
        assert!(message.is_finished());
    }

    #[test]
    fn tool_results_pair_with_calls() {
        let mut message = ReconstructedMessage::default();
        for event in [
            OutboundEvent::ToolCallAnnounced {
                name: "roll_dice".to_owned(),
                arguments: "{}".to_owned(),
            },
            OutboundEvent::ToolCallAnnounced {
                name: "roll_dice".to_owned(),
                arguments: r#"{"sides":20}"#.to_owned(),
            },
            OutboundEvent::ToolResultAnnounced {
                name: "roll_dice".to_owned(),
                result: "4".to_owned(),
            },
            OutboundEvent::ToolResultAnnounced {
                name: "roll_dice".to_owned(),
                result: "17".to_owned(),
            },
        ] {
            message.apply(&event);
        }

        let results: Vec<_> = message.tools.iter().map(|t| t.result.as_deref()).collect();
        assert_eq!(results, [Some("4"), Some("17")]);
        assert_eq!(message.tools[1].arguments, r#"{"sides":20}"#);
    }
}
