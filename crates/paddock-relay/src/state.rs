//! Shared relay state

use std::sync::Arc;

use paddock_config::{Config, RelayConfig};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::RelayError;
use crate::images::ImageCatalog;
use crate::store::{MemoryTranscriptStore, TranscriptStore};
use crate::target::EndpointRegistry;
use crate::tools::ToolRegistry;
use crate::upstream::{HttpUpstream, Upstream};

/// State shared by every session and route handler
#[derive(Clone)]
pub struct RelayState {
    inner: Arc<RelayStateInner>,
}

struct RelayStateInner {
    endpoints: EndpointRegistry,
    upstream: Arc<dyn Upstream>,
    tools: ToolRegistry,
    store: Arc<dyn TranscriptStore>,
    catalog: Mutex<ImageCatalog>,
    settings: RelayConfig,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for RelayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayState")
            .field("endpoints", &self.inner.endpoints)
            .field("tools", &self.inner.tools)
            .finish_non_exhaustive()
    }
}

impl RelayState {
    /// Build the state from configuration with the HTTP upstream,
    /// built-in tools and an in-memory transcript store
    pub fn from_config(config: &Config, shutdown: CancellationToken) -> Result<Self, RelayError> {
        let upstream = HttpUpstream::new(&config.relay)?;

        tracing::info!(
            endpoints = config.endpoints.len(),
            "relay initialized"
        );

        Ok(Self::new(
            EndpointRegistry::from_config(&config.endpoints),
            Arc::new(upstream),
            ToolRegistry::with_builtins(),
            Arc::new(MemoryTranscriptStore::new()),
            config.relay.clone(),
            shutdown,
        ))
    }

    /// Assemble the state from its parts
    pub fn new(
        endpoints: EndpointRegistry,
        upstream: Arc<dyn Upstream>,
        tools: ToolRegistry,
        store: Arc<dyn TranscriptStore>,
        settings: RelayConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let catalog = Mutex::new(ImageCatalog::new(settings.image_catalog_ttl));
        Self {
            inner: Arc::new(RelayStateInner {
                endpoints,
                upstream,
                tools,
                store,
                catalog,
                settings,
                shutdown,
            }),
        }
    }

    /// Configured endpoints
    pub fn endpoints(&self) -> &EndpointRegistry {
        &self.inner.endpoints
    }

    /// Upstream transport
    pub fn upstream(&self) -> &dyn Upstream {
        self.inner.upstream.as_ref()
    }

    /// Registered tools
    pub fn tools(&self) -> &ToolRegistry {
        &self.inner.tools
    }

    /// Transcript storage
    pub fn store(&self) -> &dyn TranscriptStore {
        self.inner.store.as_ref()
    }

    /// Generated-image listing
    pub fn catalog(&self) -> &Mutex<ImageCatalog> {
        &self.inner.catalog
    }

    /// Relay settings
    pub fn settings(&self) -> &RelayConfig {
        &self.inner.settings
    }

    /// Cancelled when the process is shutting down
    pub fn shutdown(&self) -> &CancellationToken {
        &self.inner.shutdown
    }
}
