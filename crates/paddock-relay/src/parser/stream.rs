use std::collections::VecDeque;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};

use super::frame::{LineFramer, SseLine};
use super::think::ThinkTagSplitter;
use crate::convert::ChunkDecoder;
use crate::error::RelayError;
use crate::target::ProviderTarget;
use crate::types::DeltaFragment;

/// Push-based parser for one upstream round
///
/// Feeds bytes through line framing, the dialect decoder and, for targets
/// that embed reasoning in `<think>` tags, the tag splitter. Exactly one
/// `Done` is produced; anything after it is ignored.
#[derive(Debug)]
pub struct FragmentParser {
    framer: LineFramer,
    decoder: ChunkDecoder,
    splitter: Option<ThinkTagSplitter>,
    finished: bool,
}

impl FragmentParser {
    /// Parser configured for a target's dialect and capabilities
    pub fn for_target(target: &ProviderTarget) -> Self {
        Self {
            framer: LineFramer::default(),
            decoder: ChunkDecoder::new(target.dialect, &target.capabilities),
            splitter: target.capabilities.think_tags.then(ThinkTagSplitter::default),
            finished: false,
        }
    }

    /// Whether `Done` has been produced
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Accept a network chunk
    ///
    /// # Errors
    ///
    /// Returns the upstream's error when a payload reports one in-stream.
    /// Undecodable lines come back as [`DeltaFragment::Malformed`] instead.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<DeltaFragment>, RelayError> {
        let mut out = Vec::new();
        for line in self.framer.feed(chunk) {
            self.handle_line(line, &mut out)?;
        }
        Ok(out)
    }

    /// The body ended; flush held text and make sure the round is closed
    ///
    /// # Errors
    ///
    /// Returns the upstream's error if the unterminated last line reports one
    pub fn finish(&mut self) -> Result<Vec<DeltaFragment>, RelayError> {
        let mut out = Vec::new();
        if let Some(line) = self.framer.finish() {
            self.handle_line(line, &mut out)?;
        }
        if !self.finished {
            self.close(&mut out);
        }
        Ok(out)
    }

    fn handle_line(&mut self, line: SseLine, out: &mut Vec<DeltaFragment>) -> Result<(), RelayError> {
        if self.finished {
            return Ok(());
        }

        let payload = match line {
            SseLine::Data(payload) => payload,
            SseLine::Invalid(raw) => {
                out.push(DeltaFragment::Malformed(raw));
                return Ok(());
            }
        };

        match self.decoder.decode(&payload) {
            Ok(fragments) => {
                for fragment in fragments {
                    self.route(fragment, out);
                }
                Ok(())
            }
            Err(e) if e.is_silent() => {
                out.push(DeltaFragment::Malformed(e.to_string()));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn route(&mut self, fragment: DeltaFragment, out: &mut Vec<DeltaFragment>) {
        if self.finished {
            return;
        }
        match (fragment, self.splitter.as_mut()) {
            (DeltaFragment::Answer(text), Some(splitter)) => out.extend(splitter.push(&text)),
            (DeltaFragment::Done, _) => self.close(out),
            (other, _) => out.push(other),
        }
    }

    fn close(&mut self, out: &mut Vec<DeltaFragment>) {
        if let Some(splitter) = self.splitter.as_mut() {
            out.extend(splitter.finish());
        }
        out.push(DeltaFragment::Done);
        self.finished = true;
    }
}

/// Run the `<think>` splitter over fragments of a blocking response
pub fn split_think_tags(fragments: Vec<DeltaFragment>) -> Vec<DeltaFragment> {
    let mut splitter = ThinkTagSplitter::default();
    let mut out = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        match fragment {
            DeltaFragment::Answer(text) => out.extend(splitter.push(&text)),
            DeltaFragment::Done => {
                out.extend(splitter.finish());
                out.push(DeltaFragment::Done);
            }
            other => out.push(other),
        }
    }
    out.extend(splitter.finish());
    out
}

/// Pull-based view of one upstream round
///
/// The orchestrator asks for the next fragment and gets `None` once the
/// round is over. Reading stops at `Done`, which drops the connection.
pub struct DeltaStream {
    body: Option<BoxStream<'static, Result<Bytes, RelayError>>>,
    parser: Option<FragmentParser>,
    pending: VecDeque<DeltaFragment>,
}

impl std::fmt::Debug for DeltaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeltaStream")
            .field("open", &self.body.is_some())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl DeltaStream {
    /// Wrap a response body
    pub fn new<S>(body: S, parser: FragmentParser) -> Self
    where
        S: Stream<Item = Result<Bytes, RelayError>> + Send + 'static,
    {
        Self {
            body: Some(body.boxed()),
            parser: Some(parser),
            pending: VecDeque::new(),
        }
    }

    /// A stream that replays already decoded fragments
    pub fn from_fragments(fragments: impl IntoIterator<Item = DeltaFragment>) -> Self {
        Self {
            body: None,
            parser: None,
            pending: fragments.into_iter().collect(),
        }
    }

    /// Next fragment, or `None` at the end of the round
    pub async fn next_fragment(&mut self) -> Option<Result<DeltaFragment, RelayError>> {
        loop {
            if let Some(fragment) = self.pending.pop_front() {
                return Some(Ok(fragment));
            }

            let body = self.body.as_mut()?;
            let parser = self.parser.as_mut()?;

            let parsed = match body.next().await {
                Some(Ok(chunk)) => parser.push(&chunk),
                Some(Err(e)) => Err(e),
                None => parser.finish(),
            };

            match parsed {
                Ok(fragments) => {
                    self.pending.extend(fragments);
                    if parser.is_finished() {
                        self.body = None;
                    }
                }
                Err(e) => {
                    self.body = None;
                    self.pending.clear();
                    return Some(Err(e));
                }
            }
        }
    }
}
