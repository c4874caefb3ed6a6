#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

//! Typed Rust HTTP client for the Paddock relay
//!
//! Reads the relay's line protocol back into per-pane messages and derives
//! latency and throughput metrics for side-by-side comparison

mod client;
pub mod consumer;
pub mod error;
pub mod message;
pub mod metrics;

pub use client::{CompletedTurn, EndpointInfo, ImageOutcome, ImageTurn, PaddockClient, TurnSnapshot};
pub use consumer::{LineAssembler, StreamConsumer};
pub use error::{ClientError, Result};
pub use message::{ReconstructedMessage, ToolActivity};
pub use metrics::{MetricsRecorder, PerformanceMetrics};
