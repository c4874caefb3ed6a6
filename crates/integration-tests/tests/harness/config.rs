//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use indexmap::IndexMap;
use paddock_config::{
    CapabilitiesConfig, Config, Dialect, EndpointConfig, EndpointKind, HealthConfig, RelayConfig, ServerConfig,
    TelemetryConfig,
};
use secrecy::SecretString;

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with minimal defaults
    pub fn new() -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    health: HealthConfig {
                        enabled: true,
                        ..HealthConfig::default()
                    },
                    ..ServerConfig::default()
                },
                relay: RelayConfig {
                    simulated_chunk_delay: Duration::ZERO,
                    ..RelayConfig::default()
                },
                endpoints: IndexMap::new(),
                telemetry: TelemetryConfig::default(),
            },
        }
    }

    /// Add a chat endpoint pointed at a mock backend
    pub fn with_endpoint(self, id: &str, dialect: Dialect, base_url: &str) -> Self {
        self.with_chat_endpoint(id, dialect, base_url, CapabilitiesConfig::default())
    }

    /// Add a chat endpoint with explicit capability flags
    pub fn with_chat_endpoint(
        mut self,
        id: &str,
        dialect: Dialect,
        base_url: &str,
        capabilities: CapabilitiesConfig,
    ) -> Self {
        self.config.endpoints.insert(
            id.to_owned(),
            EndpointConfig {
                dialect,
                kind: EndpointKind::Chat,
                base_url: Some(base_url.parse().expect("valid URL")),
                api_key: Some(SecretString::from("test-key")),
                model: format!("{id}-model"),
                temperature: None,
                display_name: None,
                capabilities,
            },
        );
        self
    }

    /// Add an `OpenAI`-compatible image endpoint
    pub fn with_image_endpoint(mut self, id: &str, base_url: &str) -> Self {
        self.config.endpoints.insert(
            id.to_owned(),
            EndpointConfig {
                dialect: Dialect::Openai,
                kind: EndpointKind::Image,
                base_url: Some(base_url.parse().expect("valid URL")),
                api_key: Some(SecretString::from("test-key")),
                model: "image-model".to_owned(),
                temperature: None,
                display_name: Some("Painter".to_owned()),
                capabilities: CapabilitiesConfig::default(),
            },
        );
        self
    }

    /// Resolve uploads and write generated images under `dir`
    pub fn with_data_dir(mut self, dir: &Path) -> Self {
        self.config.relay.upload_dir = dir.join("uploads");
        self.config.relay.image_output_dir = dir.join("generated");
        self
    }

    /// Bound every session
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.relay.request_timeout = timeout;
        self
    }

    /// Disable health endpoint
    pub fn without_health(mut self) -> Self {
        self.config.server.health.enabled = false;
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}
