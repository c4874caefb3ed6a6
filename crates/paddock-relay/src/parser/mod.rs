//! Incremental stream parser
//!
//! Raw upstream bytes go in, [`DeltaFragment`](crate::types::DeltaFragment)s
//! come out. Three layers, innermost first:
//!
//! - [`LineFramer`]: reassembles SSE lines across arbitrary chunk boundaries
//! - [`ThinkTagSplitter`]: separates `<think>` reasoning from answer text
//! - [`FragmentParser`] / [`DeltaStream`]: run the dialect decoder over each
//!   line, synchronously or pulled from an HTTP body

mod frame;
mod stream;
mod think;

pub use frame::{LineFramer, SseLine};
pub use stream::{DeltaStream, FragmentParser, split_think_tags};
pub use think::{CLOSE_TAG, LOOKAHEAD, OPEN_TAG, ThinkTagSplitter};
