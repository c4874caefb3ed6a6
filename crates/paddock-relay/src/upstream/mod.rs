//! Upstream adapter
//!
//! The orchestrator talks to providers only through [`Upstream`], so tests
//! can script rounds without a network.

mod http;
#[cfg(test)]
pub(crate) mod scripted;

use async_trait::async_trait;

pub use http::HttpUpstream;

use crate::error::RelayError;
use crate::parser::DeltaStream;
use crate::target::ProviderTarget;
use crate::types::{CompletionRequest, DeltaFragment};

/// Bytes of a generated image plus the provider's commentary
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    /// Encoded image (PNG for every supported provider)
    pub bytes: Vec<u8>,
    /// Prompt as rewritten by the provider
    pub revised_prompt: Option<String>,
}

/// Transport to a completion provider
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Start a streamed round
    async fn open_stream(&self, target: &ProviderTarget, request: &CompletionRequest)
    -> Result<DeltaStream, RelayError>;

    /// Run one blocking round; the fragments end in `Done`
    async fn complete(
        &self,
        target: &ProviderTarget,
        request: &CompletionRequest,
    ) -> Result<Vec<DeltaFragment>, RelayError>;

    /// Generate one image from a prompt
    async fn generate_image(&self, target: &ProviderTarget, prompt: &str) -> Result<GeneratedImage, RelayError>;
}
