use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Configuration for a single upstream endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    /// Upstream wire dialect
    pub dialect: Dialect,
    /// What the endpoint produces
    #[serde(default)]
    pub kind: EndpointKind,
    /// Base URL; the dialect's path suffix is appended when missing
    #[serde(default)]
    pub base_url: Option<Url>,
    /// API key for authentication
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Model identifier sent upstream
    pub model: String,
    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Label shown in comparison panes
    #[serde(default)]
    pub display_name: Option<String>,
    /// Explicit capability flags
    #[serde(default)]
    pub capabilities: CapabilitiesConfig,
}

/// Supported upstream wire dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// OpenAI-compatible chat completions
    Openai,
    /// Anthropic Messages API
    Anthropic,
    /// Google Generative Language API
    Google,
}

/// What an endpoint is used for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    /// Conversational completions (text-turn family)
    #[default]
    Chat,
    /// Image generation (media family)
    Image,
}

/// Per-endpoint capability flags
///
/// The relay branches on these booleans only; it never sniffs URLs or
/// model names.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapabilitiesConfig {
    /// Provider streams tool-call deltas when tools are attached
    #[serde(default = "default_true")]
    pub streaming_with_tools: bool,
    /// Reasoning arrives in a dedicated delta field
    #[serde(default)]
    pub reasoning_field: bool,
    /// Reasoning is embedded in the answer between `<think>` tags
    #[serde(default)]
    pub think_tags: bool,
    /// Model accepts a temperature parameter
    #[serde(default = "default_true")]
    pub accepts_temperature: bool,
    /// Model accepts an assistant tool-call turn followed by tool-role turns
    #[serde(default = "default_true")]
    pub tool_role_sequence: bool,
}

impl Default for CapabilitiesConfig {
    fn default() -> Self {
        Self {
            streaming_with_tools: true,
            reasoning_field: false,
            think_tags: false,
            accepts_temperature: true,
            tool_role_sequence: true,
        }
    }
}

#[allow(clippy::missing_const_for_fn)]
fn default_true() -> bool {
    true
}
