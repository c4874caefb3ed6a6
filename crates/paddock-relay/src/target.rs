//! Endpoint resolution
//!
//! Capability flags are read from configuration once; nothing downstream
//! inspects URLs or model names.

use std::sync::Arc;

use indexmap::IndexMap;
use paddock_config::{CapabilitiesConfig, EndpointConfig, EndpointKind};
use secrecy::SecretString;
use serde::Serialize;

use crate::error::RelayError;

/// Upstream wire dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// `OpenAI`-compatible chat completions
    #[serde(rename = "openai")]
    OpenAi,
    /// Anthropic Messages API
    Anthropic,
    /// Google Generative Language API
    Google,
}

impl Dialect {
    const fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com/v1",
            Self::Google => "https://generativelanguage.googleapis.com/v1beta",
        }
    }
}

impl From<paddock_config::Dialect> for Dialect {
    fn from(dialect: paddock_config::Dialect) -> Self {
        match dialect {
            paddock_config::Dialect::Openai => Self::OpenAi,
            paddock_config::Dialect::Anthropic => Self::Anthropic,
            paddock_config::Dialect::Google => Self::Google,
        }
    }
}

/// Explicit per-endpoint behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Capabilities {
    /// Provider streams tool-call deltas when tools are attached
    pub streaming_with_tools: bool,
    /// Reasoning arrives in a dedicated delta field
    pub reasoning_field: bool,
    /// Reasoning is embedded in the answer between `<think>` tags
    pub think_tags: bool,
    /// Model accepts a temperature parameter
    pub accepts_temperature: bool,
    /// Model accepts an assistant tool-call turn followed by tool-role turns
    pub tool_role_sequence: bool,
}

impl From<&CapabilitiesConfig> for Capabilities {
    fn from(config: &CapabilitiesConfig) -> Self {
        Self {
            streaming_with_tools: config.streaming_with_tools,
            reasoning_field: config.reasoning_field,
            think_tags: config.think_tags,
            accepts_temperature: config.accepts_temperature,
            tool_role_sequence: config.tool_role_sequence,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        (&CapabilitiesConfig::default()).into()
    }
}

/// Everything needed to talk to one upstream endpoint
#[derive(Debug, Clone)]
pub struct ProviderTarget {
    /// Configuration key
    pub endpoint_id: String,
    /// Label for comparison panes
    pub display_name: String,
    /// Wire dialect
    pub dialect: Dialect,
    /// Chat or image endpoint
    pub kind: EndpointKind,
    /// Base URL as configured, or the dialect default
    pub base_url: String,
    /// Credential
    pub auth_token: Option<SecretString>,
    /// Model identifier sent upstream
    pub model_id: String,
    /// Configured temperature
    pub temperature: Option<f64>,
    /// Behaviour switches
    pub capabilities: Capabilities,
}

impl ProviderTarget {
    /// Resolve a target from its configuration entry
    pub fn from_config(endpoint_id: &str, config: &EndpointConfig) -> Self {
        let dialect = Dialect::from(config.dialect);
        let base_url = config
            .base_url
            .as_ref()
            .map_or_else(|| dialect.default_base_url().to_owned(), ToString::to_string);

        Self {
            endpoint_id: endpoint_id.to_owned(),
            display_name: config.display_name.clone().unwrap_or_else(|| endpoint_id.to_owned()),
            dialect,
            kind: config.kind,
            base_url,
            auth_token: config.api_key.clone(),
            model_id: config.model.clone(),
            temperature: config.temperature,
            capabilities: (&config.capabilities).into(),
        }
    }

    /// Temperature to send, if the model accepts one
    pub fn effective_temperature(&self) -> Option<f64> {
        self.temperature.filter(|_| self.capabilities.accepts_temperature)
    }

    /// Whether a turn must fall back to one blocking call plus simulated chunks
    pub const fn uses_single_shot(&self, tools_attached: bool) -> bool {
        tools_attached && !self.capabilities.streaming_with_tools
    }

    /// Chat endpoint URL for this dialect
    pub fn chat_url(&self, stream: bool) -> String {
        match self.dialect {
            Dialect::OpenAi => resolve_url(&self.base_url, "/chat/completions"),
            Dialect::Anthropic => resolve_url(&self.base_url, "/messages"),
            Dialect::Google if stream => resolve_url(
                &self.base_url,
                &format!("/models/{}:streamGenerateContent?alt=sse", self.model_id),
            ),
            Dialect::Google => resolve_url(&self.base_url, &format!("/models/{}:generateContent", self.model_id)),
        }
    }

    /// Image generation URL
    pub fn image_url(&self) -> String {
        resolve_url(&self.base_url, "/images/generations")
    }
}

/// Strip trailing slashes and append `suffix` unless it is already there
///
/// Applying it to its own output returns the same URL.
pub fn resolve_url(base: &str, suffix: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.ends_with(suffix) {
        base.to_owned()
    } else {
        format!("{base}{suffix}")
    }
}

/// Public view of an endpoint for the comparison UI
#[derive(Debug, Clone, Serialize)]
pub struct EndpointSummary {
    /// Configuration key
    pub id: String,
    /// Label
    pub display_name: String,
    /// Model identifier
    pub model: String,
    /// Wire dialect
    pub dialect: Dialect,
    /// "chat" or "image"
    pub kind: &'static str,
}

/// Configured endpoints in declaration order
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    targets: IndexMap<String, Arc<ProviderTarget>>,
}

impl EndpointRegistry {
    /// Build from the `[endpoints]` table
    pub fn from_config(endpoints: &IndexMap<String, EndpointConfig>) -> Self {
        let targets = endpoints
            .iter()
            .map(|(id, config)| (id.clone(), Arc::new(ProviderTarget::from_config(id, config))))
            .collect();
        Self { targets }
    }

    /// Add or replace a target
    pub fn insert(&mut self, target: ProviderTarget) {
        self.targets.insert(target.endpoint_id.clone(), Arc::new(target));
    }

    /// Look up a target by endpoint id
    ///
    /// # Errors
    ///
    /// Returns `RelayError::EndpointNotFound` for unknown ids
    pub fn resolve(&self, endpoint_id: &str) -> Result<Arc<ProviderTarget>, RelayError> {
        self.targets
            .get(endpoint_id)
            .cloned()
            .ok_or_else(|| RelayError::EndpointNotFound(endpoint_id.to_owned()))
    }

    /// Summaries of every endpoint, secrets excluded
    pub fn summaries(&self) -> Vec<EndpointSummary> {
        self.targets
            .values()
            .map(|t| EndpointSummary {
                id: t.endpoint_id.clone(),
                display_name: t.display_name.clone(),
                model: t.model_id.clone(),
                dialect: t.dialect,
                kind: match t.kind {
                    EndpointKind::Chat => "chat",
                    EndpointKind::Image => "image",
                },
            })
            .collect()
    }
}
