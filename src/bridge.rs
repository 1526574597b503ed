//! Inbound frame bridging to the host routing pipeline.
//!
//! The bridge is a stateless pass-through: each received frame is tagged
//! with its originating connection and receive timestamp, then handed to
//! the pipeline's intake. Delivery is at-most-once; a frame the pipeline
//! refuses is dropped, since retrying a stale frame is not meaningful for
//! a live session protocol.

use std::{sync::Arc, time::SystemTime};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{config::EndpointConfig, session::ConnectionId, transport::Frame};

/// One received frame, tagged for the routing pipeline.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    /// Connection the frame arrived on.
    pub connection_id: ConnectionId,
    /// Frame payload as received.
    pub payload: Frame,
    /// Instant the hub accepted the frame from the transport.
    pub received_at: SystemTime,
}

/// Error reported by a pipeline refusing an inbound message.
#[derive(Debug, Error)]
#[error("routing pipeline refused the frame: {reason}")]
pub struct IntakeError {
    /// Pipeline-supplied reason, for diagnostics only.
    pub reason: String,
}

impl IntakeError {
    /// Create an intake error with the given reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Consumer-side boundary of the host integration engine.
#[async_trait]
pub trait RoutingPipeline: Send + Sync + 'static {
    /// Accept one inbound message for routing.
    ///
    /// # Errors
    ///
    /// Returns an [`IntakeError`] when the pipeline cannot accept the
    /// message, for example while shutting down.
    async fn intake(&self, message: InboundMessage) -> Result<(), IntakeError>;
}

/// Consumer-side capability: forwards received frames into the pipeline.
#[derive(Clone)]
pub struct InboundBridge {
    pipeline: Arc<dyn RoutingPipeline>,
    config: Arc<EndpointConfig>,
}

impl InboundBridge {
    pub(crate) fn new(pipeline: Arc<dyn RoutingPipeline>, config: Arc<EndpointConfig>) -> Self {
        Self { pipeline, config }
    }

    /// Forward one frame received on `id` to the routing pipeline.
    ///
    /// Intake failures are logged and counted; the frame is dropped and the
    /// connection stays open.
    pub async fn on_frame(&self, id: ConnectionId, payload: Frame) {
        crate::metrics::inc_frames(crate::metrics::Direction::Inbound);
        if self.config.diagnostics_enabled() {
            debug!(conn = %id, bytes = payload.len(), "inbound frame");
        }
        let message = InboundMessage {
            connection_id: id,
            payload,
            received_at: SystemTime::now(),
        };
        if let Err(error) = self.pipeline.intake(message).await {
            crate::metrics::inc_errors();
            warn!(conn = %id, %error, "inbound frame dropped");
        }
    }
}
