use crate::types::DeltaFragment;

/// Opening reasoning delimiter
pub const OPEN_TAG: &str = "<think>";
/// Closing reasoning delimiter
pub const CLOSE_TAG: &str = "</think>";
/// Characters withheld so a delimiter split across deltas is still seen
pub const LOOKAHEAD: usize = CLOSE_TAG.len();

/// Splits answer text with embedded `<think>` spans into reasoning and answer
///
/// The trailing [`LOOKAHEAD`] characters are always held back, so the
/// partition does not depend on where the upstream cut its chunks.
/// Delimiters never reach the output. A delimiter that does not change
/// the mode (a stray `</think>` while answering) is dropped as well.
#[derive(Debug, Default)]
pub struct ThinkTagSplitter {
    buffer: String,
    thinking: bool,
}

impl ThinkTagSplitter {
    /// Whether text is currently classed as reasoning
    pub const fn is_thinking(&self) -> bool {
        self.thinking
    }

    /// Accept one delta of raw text
    pub fn push(&mut self, text: &str) -> Vec<DeltaFragment> {
        self.buffer.push_str(text);

        let mut out = Vec::new();
        while let Some((at, tag)) = self.next_delimiter() {
            let before: String = self.buffer.drain(..at).collect();
            self.emit(before, &mut out);
            self.buffer.drain(..tag.len());
            self.thinking = tag == OPEN_TAG;
        }

        let held = self.buffer.chars().count();
        if held > LOOKAHEAD {
            let cut = self
                .buffer
                .char_indices()
                .nth(held - LOOKAHEAD)
                .map_or(self.buffer.len(), |(i, _)| i);
            let excess: String = self.buffer.drain(..cut).collect();
            self.emit(excess, &mut out);
        }

        out
    }

    /// Release whatever is still held, in the current class
    pub fn finish(&mut self) -> Vec<DeltaFragment> {
        let rest = std::mem::take(&mut self.buffer);
        let mut out = Vec::new();
        self.emit(rest, &mut out);
        out
    }

    fn next_delimiter(&self) -> Option<(usize, &'static str)> {
        let open = self.buffer.find(OPEN_TAG).map(|at| (at, OPEN_TAG));
        let close = self.buffer.find(CLOSE_TAG).map(|at| (at, CLOSE_TAG));
        match (open, close) {
            (Some(o), Some(c)) => Some(if o.0 < c.0 { o } else { c }),
            (found, None) | (None, found) => found,
        }
    }

    fn emit(&self, text: String, out: &mut Vec<DeltaFragment>) {
        if text.is_empty() {
            return;
        }
        out.push(if self.thinking {
            DeltaFragment::Reasoning(text)
        } else {
            DeltaFragment::Answer(text)
        });
    }
}
