//! `OpenAI`-compatible image generation wire format

use serde::{Deserialize, Serialize};

/// `/images/generations` request
#[derive(Debug, Clone, Serialize)]
pub struct ImageGenerationRequest {
    /// Model identifier
    pub model: String,
    /// Text prompt
    pub prompt: String,
    /// Number of images
    pub n: u32,
    /// Always `b64_json` so the relay can store the bytes itself
    pub response_format: &'static str,
}

/// `/images/generations` response
#[derive(Debug, Clone, Deserialize)]
pub struct ImageGenerationResponse {
    /// Generated images
    #[serde(default)]
    pub data: Vec<ImageDatum>,
}

/// One generated image
#[derive(Debug, Clone, Deserialize)]
pub struct ImageDatum {
    /// Base64-encoded image
    #[serde(default)]
    pub b64_json: Option<String>,
    /// Hosted image URL (providers that ignore `response_format`)
    #[serde(default)]
    pub url: Option<String>,
    /// Prompt as rewritten by the provider
    #[serde(default)]
    pub revised_prompt: Option<String>,
}
