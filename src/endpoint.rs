//! Endpoint wiring for one websocket route.
//!
//! An [`Endpoint`] bundles the validated configuration with the registry
//! and synchronizer serving one URI, and hands out the producer-side
//! ([`Dispatcher`]) and consumer-side ([`InboundBridge`]) capabilities
//! composed over them. The transport layer receives the synchronizer and
//! drives it with connection events.

use std::sync::Arc;

use tracing::info;

use crate::{
    bridge::{InboundBridge, RoutingPipeline},
    config::EndpointConfig,
    dispatch::Dispatcher,
    session::SessionRegistry,
    sync::SessionSynchronizer,
};

/// One logical websocket endpoint: configuration, registry, and lifecycle.
pub struct Endpoint {
    config: Arc<EndpointConfig>,
    registry: Arc<SessionRegistry>,
    synchronizer: Arc<SessionSynchronizer>,
}

impl Endpoint {
    /// Wire an endpoint from a validated configuration.
    #[must_use]
    pub fn new(config: EndpointConfig) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(SessionRegistry::new());
        let synchronizer = Arc::new(SessionSynchronizer::new(
            Arc::clone(&registry),
            Arc::clone(&config),
        ));
        Self {
            config,
            registry,
            synchronizer,
        }
    }

    /// Begin accepting sessions.
    pub fn open(&self) {
        self.synchronizer.start();
        info!(uri = %self.uri(), "endpoint open");
    }

    /// Stop accepting sessions, force-close the live ones, and wait out the
    /// configured grace period. Safe to call more than once.
    pub async fn close(&self) {
        self.synchronizer.shutdown().await;
        info!(uri = %self.uri(), "endpoint closed");
    }

    /// The endpoint's configuration.
    #[must_use]
    pub fn config(&self) -> &EndpointConfig { &self.config }

    /// The registry of currently open sessions.
    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> { &self.registry }

    /// The lifecycle hooks the transport layer drives.
    #[must_use]
    pub fn synchronizer(&self) -> Arc<SessionSynchronizer> { Arc::clone(&self.synchronizer) }

    /// Create a producer-side dispatcher for this endpoint.
    #[must_use]
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(Arc::clone(&self.registry), Arc::clone(&self.config))
    }

    /// Create a consumer-side bridge feeding `pipeline`.
    #[must_use]
    pub fn bridge(&self, pipeline: Arc<dyn RoutingPipeline>) -> InboundBridge {
        InboundBridge::new(pipeline, Arc::clone(&self.config))
    }

    /// The URI this endpoint serves.
    #[must_use]
    pub fn uri(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.config.scheme(),
            self.config.host(),
            self.config.port(),
            self.config.path(),
        )
    }
}
