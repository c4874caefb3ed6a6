//! Tool-call orchestrator
//!
//! Drives a turn as a plain loop over pull-based rounds:
//!
//! ```text
//! Idle -> Accumulating -> ReadyToExecute -> Executing -> Resubmitting -> Draining -> Done
//! ```
//!
//! A turn without tool calls goes straight from the first round to `Done`.
//! At most one follow-up round runs; tool calls inside it are ignored.

use paddock_config::RelayConfig;

use crate::emitter::Emitter;
use crate::error::RelayError;
use crate::parser::DeltaStream;
use crate::target::ProviderTarget;
use crate::tools::{CompletedToolCall, ToolCallAccumulator, ToolRegistry};
use crate::types::{CompletionRequest, Content, DeltaFragment, Message, ToolDefinition};
use crate::upstream::Upstream;

/// Where a turn is in the tool flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing requested yet
    Idle,
    /// First round is streaming; tool-call pieces are being collected
    Accumulating,
    /// First round ended; complete calls are being promoted
    ReadyToExecute,
    /// Tools are running
    Executing,
    /// Follow-up request is being built and sent
    Resubmitting,
    /// Follow-up round is streaming
    Draining,
    /// Terminal
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Round {
    First,
    FollowUp,
}

/// Runs one turn against one target
pub struct Orchestrator<'a> {
    target: &'a ProviderTarget,
    upstream: &'a dyn Upstream,
    tools: &'a ToolRegistry,
    settings: &'a RelayConfig,
    phase: Phase,
}

impl std::fmt::Debug for Orchestrator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("endpoint", &self.target.endpoint_id)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl<'a> Orchestrator<'a> {
    /// Orchestrator in the `Idle` phase
    pub fn new(
        target: &'a ProviderTarget,
        upstream: &'a dyn Upstream,
        tools: &'a ToolRegistry,
        settings: &'a RelayConfig,
    ) -> Self {
        Self {
            target,
            upstream,
            tools,
            settings,
            phase: Phase::Idle,
        }
    }

    /// Current phase
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Relay a whole turn, ending it with `Done` on success
    ///
    /// Errors are returned to the caller, which owns the terminal `Error`.
    pub async fn run(
        &mut self,
        messages: Vec<Message>,
        tools_enabled: bool,
        emitter: &mut Emitter,
    ) -> Result<(), RelayError> {
        let definitions = (tools_enabled && !self.tools.is_empty()).then(|| self.tools.definitions());
        let single_shot = self.target.uses_single_shot(definitions.is_some());

        self.enter(Phase::Accumulating);
        let mut accumulator = ToolCallAccumulator::default();
        let first = self.request(messages.clone(), definitions, !single_shot);

        if single_shot {
            tracing::debug!(
                endpoint = %self.target.endpoint_id,
                "provider cannot stream tool calls; using a blocking round"
            );
            let fragments = self.upstream.complete(self.target, &first).await?;
            self.replay(fragments, emitter, &mut accumulator).await?;
        } else {
            let mut stream = self.upstream.open_stream(self.target, &first).await?;
            self.drain(&mut stream, Round::First, emitter, &mut accumulator).await?;
        }

        self.enter(Phase::ReadyToExecute);
        let calls = accumulator.complete();
        if calls.is_empty() {
            self.enter(Phase::Done);
            return emitter.done().await;
        }

        self.enter(Phase::Executing);
        let round_one_text = emitter.answer_text().to_owned();
        let mut results = Vec::with_capacity(calls.len());
        for call in &calls {
            emitter.tool_call(&call.name, &call.arguments_text()).await?;
            let result = self.tools.execute(call).await;
            emitter.tool_result(&call.name, &result).await?;
            results.push(result);
        }

        self.enter(Phase::Resubmitting);
        let follow_up_messages = self.follow_up_messages(messages, &round_one_text, &calls, &results);
        let follow_up = self.request(follow_up_messages, None, true);
        let mut stream = self.upstream.open_stream(self.target, &follow_up).await?;

        self.enter(Phase::Draining);
        let mut ignored = ToolCallAccumulator::default();
        self.drain(&mut stream, Round::FollowUp, emitter, &mut ignored).await?;

        self.enter(Phase::Done);
        emitter.done().await
    }

    fn enter(&mut self, phase: Phase) {
        tracing::debug!(endpoint = %self.target.endpoint_id, from = ?self.phase, to = ?phase, "tool flow transition");
        self.phase = phase;
    }

    fn request(&self, messages: Vec<Message>, tools: Option<Vec<ToolDefinition>>, stream: bool) -> CompletionRequest {
        CompletionRequest {
            model: self.target.model_id.clone(),
            messages,
            temperature: self.target.effective_temperature(),
            max_tokens: self.settings.max_tokens,
            tools,
            stream,
        }
    }

    fn follow_up_messages(
        &self,
        mut messages: Vec<Message>,
        round_one_text: &str,
        calls: &[CompletedToolCall],
        results: &[String],
    ) -> Vec<Message> {
        if self.target.capabilities.tool_role_sequence {
            messages.push(Message::assistant_tool_calls(
                round_one_text,
                calls.iter().map(CompletedToolCall::to_tool_call).collect(),
            ));
            for (call, result) in calls.iter().zip(results) {
                messages.push(Message::tool_result(&call.id, &call.name, result.as_str()));
            }
            return messages;
        }

        if !round_one_text.is_empty() {
            messages.push(Message::assistant(round_one_text));
        }
        let lines: Vec<String> = calls
            .iter()
            .zip(results)
            .map(|(call, result)| format!("- {}({}) returned: {result}", call.name, call.arguments_text()))
            .collect();
        messages.push(Message::user(Content::Text(format!(
            "Results of the function calls you requested:\n{}\n\nUse these results to answer my previous message.",
            lines.join("\n")
        ))));
        messages
    }

    async fn drain(
        &self,
        stream: &mut DeltaStream,
        round: Round,
        emitter: &mut Emitter,
        accumulator: &mut ToolCallAccumulator,
    ) -> Result<(), RelayError> {
        while let Some(fragment) = stream.next_fragment().await {
            if !self.route(fragment?, round, emitter, accumulator).await? {
                break;
            }
        }
        Ok(())
    }

    /// Returns `false` once the round is over
    async fn route(
        &self,
        fragment: DeltaFragment,
        round: Round,
        emitter: &mut Emitter,
        accumulator: &mut ToolCallAccumulator,
    ) -> Result<bool, RelayError> {
        match fragment {
            DeltaFragment::Answer(text) => emitter.answer(&text).await?,
            DeltaFragment::Reasoning(text) => emitter.thinking(&text).await?,
            DeltaFragment::ToolCallPiece(piece) => match round {
                Round::First => {
                    let index = piece.index;
                    accumulator.absorb(piece);
                    if accumulator.is_complete(index) {
                        tracing::trace!(endpoint = %self.target.endpoint_id, index, "tool call arguments complete");
                    }
                }
                Round::FollowUp => {
                    tracing::debug!(
                        endpoint = %self.target.endpoint_id,
                        index = piece.index,
                        "ignoring tool call in follow-up round"
                    );
                }
            },
            DeltaFragment::Finish(reason) => {
                tracing::debug!(endpoint = %self.target.endpoint_id, ?reason, ?round, "upstream finished");
            }
            DeltaFragment::Malformed(reason) => {
                tracing::debug!(endpoint = %self.target.endpoint_id, %reason, "skipping malformed upstream line");
            }
            DeltaFragment::Done => return Ok(false),
        }
        Ok(true)
    }

    /// Deliver a blocking answer as if it had been streamed
    async fn replay(
        &self,
        fragments: Vec<DeltaFragment>,
        emitter: &mut Emitter,
        accumulator: &mut ToolCallAccumulator,
    ) -> Result<(), RelayError> {
        for fragment in fragments {
            match fragment {
                DeltaFragment::Answer(text) => {
                    for piece in self.simulated_chunks(&text) {
                        emitter.answer(piece).await?;
                        tokio::time::sleep(self.settings.simulated_chunk_delay).await;
                    }
                }
                DeltaFragment::Reasoning(text) => {
                    for piece in self.simulated_chunks(&text) {
                        emitter.thinking(piece).await?;
                        tokio::time::sleep(self.settings.simulated_chunk_delay).await;
                    }
                }
                other => {
                    if !self.route(other, Round::First, emitter, accumulator).await? {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn simulated_chunks<'t>(&self, text: &'t str) -> Vec<&'t str> {
        let size = self.settings.simulated_chunk_chars.max(1);
        let mut chunks = Vec::new();
        let mut start = 0;
        for (count, (offset, _)) in text.char_indices().enumerate() {
            if count > 0 && count % size == 0 {
                chunks.push(&text[start..offset]);
                start = offset;
            }
        }
        if start < text.len() {
            chunks.push(&text[start..]);
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use paddock_core::OutboundEvent;
    use serde_json::{Value, json};
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    use super::*;
    use crate::target::{Capabilities, Dialect};
    use crate::tools::{Tool, ToolError};
    use crate::types::{Role, ToolCallPiece};
    use crate::upstream::scripted::{Script, ScriptedUpstream};

    struct Counting {
        name: &'static str,
        calls: AtomicUsize,
        seen: Mutex<Vec<Value>>,
    }

    impl Counting {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Tool for std::sync::Arc<Counting> {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: self.name.to_owned(),
                description: format!("{} lookup", self.name),
                parameters: json!({"type": "object"}),
            }
        }

        async fn call(&self, arguments: Value) -> Result<String, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(arguments);
            Ok(format!("{} ok", self.name))
        }
    }

    fn target(capabilities: Capabilities) -> ProviderTarget {
        ProviderTarget {
            endpoint_id: "ep".to_owned(),
            display_name: "Endpoint".to_owned(),
            dialect: Dialect::OpenAi,
            kind: paddock_config::EndpointKind::Chat,
            base_url: "http://localhost".to_owned(),
            auth_token: None,
            model_id: "model-x".to_owned(),
            temperature: Some(0.5),
            capabilities,
        }
    }

    fn settings() -> RelayConfig {
        RelayConfig {
            simulated_chunk_chars: 4,
            simulated_chunk_delay: Duration::ZERO,
            ..RelayConfig::default()
        }
    }

    fn piece(index: u32, name: Option<&str>, arguments: Option<&str>) -> DeltaFragment {
        DeltaFragment::ToolCallPiece(ToolCallPiece {
            index,
            id: None,
            name: name.map(str::to_owned),
            arguments: arguments.map(str::to_owned),
        })
    }

    fn answer(text: &str) -> DeltaFragment {
        DeltaFragment::Answer(text.to_owned())
    }

    fn interleaved_round() -> Vec<DeltaFragment> {
        vec![
            answer("Checking."),
            piece(0, Some("get"), None),
            piece(1, Some("get"), None),
            piece(0, Some("Weather"), None),
            piece(0, None, Some("{\"loc")),
            piece(1, Some("Flights"), None),
            piece(0, None, Some("\":\"NYC\"}")),
            piece(1, None, Some("{}")),
            DeltaFragment::Done,
        ]
    }

    struct Harness {
        weather: std::sync::Arc<Counting>,
        flights: std::sync::Arc<Counting>,
        registry: ToolRegistry,
    }

    impl Harness {
        fn new() -> Self {
            let weather = std::sync::Arc::new(Counting::new("getWeather"));
            let flights = std::sync::Arc::new(Counting::new("getFlights"));
            let mut registry = ToolRegistry::default();
            registry.register(weather.clone());
            registry.register(flights.clone());
            Self {
                weather,
                flights,
                registry,
            }
        }
    }

    async fn run_turn(
        target: &ProviderTarget,
        upstream: &ScriptedUpstream,
        tools: &ToolRegistry,
        tools_enabled: bool,
    ) -> (Result<(), RelayError>, Phase, Vec<OutboundEvent>) {
        let settings = settings();
        let (tx, mut rx) = mpsc::channel(256);
        let mut emitter = Emitter::new(tx, Instant::now());
        let mut orchestrator = Orchestrator::new(target, upstream, tools, &settings);

        let result = orchestrator
            .run(vec![Message::user(Content::Text("hi".to_owned()))], tools_enabled, &mut emitter)
            .await;
        let phase = orchestrator.phase();
        drop(emitter);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (result, phase, events)
    }

    fn answer_text(events: &[OutboundEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                OutboundEvent::AnswerChunk { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn plain_turn_streams_and_finishes() {
        let upstream = ScriptedUpstream::new([Script::Rounds(vec![
            DeltaFragment::Reasoning("hmm".to_owned()),
            answer("Hello"),
            DeltaFragment::Malformed("garbage".to_owned()),
            answer(" world"),
            DeltaFragment::Done,
        ])]);
        let registry = ToolRegistry::with_builtins();

        let (result, phase, events) = run_turn(&target(Capabilities::default()), &upstream, &registry, false).await;
        result.unwrap();
        assert_eq!(phase, Phase::Done);

        assert!(matches!(events[0], OutboundEvent::FirstTokenMarker { .. }));
        assert_eq!(answer_text(&events), "Hello world");
        assert_eq!(events.last(), Some(&OutboundEvent::Done));

        let requests = upstream.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].tools.is_none());
        assert_eq!(requests[0].temperature, Some(0.5));
    }

    #[tokio::test]
    async fn interleaved_tool_calls_run_once_and_resubmit() {
        let harness = Harness::new();
        let upstream = ScriptedUpstream::new([
            Script::Rounds(interleaved_round()),
            Script::Rounds(vec![answer(" Sunny, and flights found."), DeltaFragment::Done]),
        ]);

        let (result, _, events) = run_turn(&target(Capabilities::default()), &upstream, &harness.registry, true).await;
        result.unwrap();

        assert_eq!(harness.weather.calls.load(Ordering::SeqCst), 1);
        assert_eq!(harness.flights.calls.load(Ordering::SeqCst), 1);
        assert_eq!(harness.weather.seen.lock().unwrap()[0], json!({"loc": "NYC"}));
        assert_eq!(harness.flights.seen.lock().unwrap()[0], json!({}));

        let announced: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                OutboundEvent::ToolCallAnnounced { name, arguments } => Some(format!("{name}{arguments}")),
                _ => None,
            })
            .collect();
        assert_eq!(announced, [r#"getWeather{"loc":"NYC"}"#, "getFlights{}"]);

        let markers = events
            .iter()
            .filter(|e| matches!(e, OutboundEvent::FirstTokenMarker { .. }))
            .count();
        assert_eq!(markers, 1);
        assert_eq!(answer_text(&events), "Checking. Sunny, and flights found.");
        assert_eq!(events.last(), Some(&OutboundEvent::Done));

        let requests = upstream.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tools.as_ref().map(Vec::len), Some(2));
        assert!(requests[1].tools.is_none());

        let follow_up = &requests[1].messages;
        assert_eq!(follow_up.len(), 4);
        let assistant = &follow_up[1];
        assert_eq!(assistant.role, Role::Assistant);
        assert_eq!(assistant.content, Content::Text("Checking.".to_owned()));
        let recorded = assistant.tool_calls.as_ref().unwrap();
        assert_eq!(recorded[0].id, "call_0");
        assert_eq!(recorded[0].function.arguments, r#"{"loc":"NYC"}"#);
        assert_eq!(follow_up[2].tool_call_id.as_deref(), Some("call_0"));
        assert_eq!(follow_up[3].content, Content::Text("getFlights ok".to_owned()));
    }

    #[tokio::test]
    async fn follow_up_tool_calls_are_never_executed() {
        let harness = Harness::new();
        let upstream = ScriptedUpstream::new([
            Script::Rounds(vec![piece(0, Some("getWeather"), Some("{}")), DeltaFragment::Done]),
            Script::Rounds(vec![
                piece(0, Some("getWeather"), Some("{}")),
                answer("done"),
                DeltaFragment::Done,
            ]),
        ]);

        let (result, phase, events) =
            run_turn(&target(Capabilities::default()), &upstream, &harness.registry, true).await;
        result.unwrap();
        assert_eq!(phase, Phase::Done);
        assert_eq!(harness.weather.calls.load(Ordering::SeqCst), 1);
        assert_eq!(upstream.requests().len(), 2);
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn fallback_sends_results_as_user_text() {
        let harness = Harness::new();
        let upstream = ScriptedUpstream::new([
            Script::Rounds(vec![piece(0, Some("getFlights"), Some("{}")), DeltaFragment::Done]),
            Script::Rounds(vec![answer("ok"), DeltaFragment::Done]),
        ]);
        let capabilities = Capabilities {
            tool_role_sequence: false,
            ..Capabilities::default()
        };

        let (result, _, _) = run_turn(&target(capabilities), &upstream, &harness.registry, true).await;
        result.unwrap();

        let requests = upstream.requests();
        let last = requests[1].messages.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert!(last.tool_calls.is_none());
        assert!(last.content.as_text().contains("- getFlights({}) returned: getFlights ok"));
        assert!(requests[1].messages.iter().all(|m| m.role != Role::Tool));
    }

    #[tokio::test]
    async fn blocking_round_is_replayed_in_chunks() {
        let harness = Harness::new();
        let upstream = ScriptedUpstream::new([Script::Rounds(vec![
            DeltaFragment::Reasoning("think".to_owned()),
            answer("Twelve chars"),
            DeltaFragment::Done,
        ])]);
        let capabilities = Capabilities {
            streaming_with_tools: false,
            ..Capabilities::default()
        };

        let (result, _, events) = run_turn(&target(capabilities), &upstream, &harness.registry, true).await;
        result.unwrap();
        assert_eq!(upstream.blocking_calls(), 1);

        let chunks: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                OutboundEvent::AnswerChunk { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(chunks, ["Twel", "ve c", "hars"]);
        assert!(events.iter().any(|e| matches!(e, OutboundEvent::Metrics { .. })));
    }

    #[tokio::test]
    async fn streaming_is_kept_when_tools_are_disabled() {
        let upstream = ScriptedUpstream::new([Script::Rounds(vec![answer("x"), DeltaFragment::Done])]);
        let capabilities = Capabilities {
            streaming_with_tools: false,
            ..Capabilities::default()
        };
        let (result, _, _) = run_turn(&target(capabilities), &upstream, &ToolRegistry::with_builtins(), false).await;
        result.unwrap();
        assert_eq!(upstream.blocking_calls(), 0);
    }

    #[tokio::test]
    async fn upstream_failure_is_returned_without_done() {
        let upstream = ScriptedUpstream::new([Script::Fail(429)]);
        let (result, phase, events) =
            run_turn(&target(Capabilities::default()), &upstream, &ToolRegistry::default(), false).await;

        let err = result.unwrap_err();
        assert!(err.user_message().starts_with("🚦 Rate Limit Exceeded"));
        assert_eq!(phase, Phase::Accumulating);
        assert!(events.is_empty());
    }

    #[test]
    fn chunks_respect_char_boundaries() {
        let target = target(Capabilities::default());
        let upstream = ScriptedUpstream::default();
        let registry = ToolRegistry::default();
        let settings = RelayConfig {
            simulated_chunk_chars: 2,
            ..RelayConfig::default()
        };
        let orchestrator = Orchestrator::new(&target, &upstream, &registry, &settings);
        assert_eq!(orchestrator.simulated_chunks("héllo🦀"), ["hé", "ll", "o🦀"]);
        assert!(orchestrator.simulated_chunks("").is_empty());
    }
}
