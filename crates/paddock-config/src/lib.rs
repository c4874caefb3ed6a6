#![allow(clippy::must_use_candidate)]

pub mod endpoint;
mod env;
mod loader;
pub mod relay;
pub mod server;
pub mod telemetry;

use indexmap::IndexMap;
use serde::Deserialize;

pub use endpoint::*;
pub use relay::*;
pub use server::*;
pub use telemetry::*;

/// Top-level Paddock configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Relay behaviour shared by every session
    #[serde(default)]
    pub relay: RelayConfig,
    /// Upstream endpoints keyed by id, in declaration order
    #[serde(default)]
    pub endpoints: IndexMap<String, EndpointConfig>,
    /// Logging configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
