//! Outbound dispatch: targeted sends and broadcasts.
//!
//! A [`Dispatcher`] resolves a [`SendRequest`] into one or more session
//! writes. Each broadcast write is independent: a failure on one session
//! never aborts delivery to the others, and every failure is reported back
//! to the caller in the [`DispatchReport`].

use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tracing::debug;

use crate::{
    config::EndpointConfig,
    outbound::WriteError,
    session::{ConnectionId, SessionRegistry},
    transport::Frame,
};

/// Recipients of one outbound send.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendMode {
    /// Deliver to every currently open session.
    Broadcast,
    /// Deliver to exactly one named session.
    Targeted(ConnectionId),
}

/// One unit of outbound work handed to a [`Dispatcher`].
///
/// A request without an explicit mode falls back to the endpoint's
/// broadcast-default flag; a call-site mode always wins over the default.
#[derive(Clone, Debug)]
pub struct SendRequest {
    payload: Frame,
    mode: Option<SendMode>,
}

impl SendRequest {
    /// A request that defers to the endpoint's broadcast-default flag.
    #[must_use]
    pub fn new(payload: impl Into<Frame>) -> Self {
        Self {
            payload: payload.into(),
            mode: None,
        }
    }

    /// A request for every currently open session.
    #[must_use]
    pub fn broadcast(payload: impl Into<Frame>) -> Self {
        Self {
            payload: payload.into(),
            mode: Some(SendMode::Broadcast),
        }
    }

    /// A request for exactly one named session.
    #[must_use]
    pub fn targeted(id: ConnectionId, payload: impl Into<Frame>) -> Self {
        Self {
            payload: payload.into(),
            mode: Some(SendMode::Targeted(id)),
        }
    }

    /// The payload to deliver.
    #[must_use]
    pub fn payload(&self) -> &Frame { &self.payload }

    /// The explicit mode, if the call site chose one.
    #[must_use]
    pub fn mode(&self) -> Option<SendMode> { self.mode }
}

/// Errors surfaced for a single dispatch call.
#[derive(Debug, Error)]
pub enum SendError {
    /// Targeted send to an identifier with no open session.
    #[error("no open session for {0}")]
    SessionNotFound(ConnectionId),
    /// The targeted session's transport rejected the write.
    #[error("delivery to {id} failed: {source}")]
    Write {
        /// Session the write was addressed to.
        id: ConnectionId,
        /// Underlying transport failure.
        #[source]
        source: WriteError,
    },
    /// The request named no target and the endpoint does not broadcast by
    /// default.
    #[error("request has no target and the endpoint does not broadcast by default")]
    MissingTarget,
}

/// Failed delivery to one session during a broadcast.
#[derive(Debug)]
pub struct DeliveryFailure {
    /// Session the write was addressed to.
    pub id: ConnectionId,
    /// Underlying transport failure.
    pub error: WriteError,
}

/// Outcome of one dispatch call.
#[derive(Debug, Default)]
pub struct DispatchReport {
    attempted: usize,
    failures: Vec<DeliveryFailure>,
}

impl DispatchReport {
    fn single() -> Self {
        Self {
            attempted: 1,
            failures: Vec::new(),
        }
    }

    /// Number of sessions the payload was addressed to.
    #[must_use]
    pub fn attempted(&self) -> usize { self.attempted }

    /// Number of sessions whose transport accepted the payload.
    #[must_use]
    pub fn delivered(&self) -> usize { self.attempted - self.failures.len() }

    /// Per-session failures, empty on complete delivery.
    #[must_use]
    pub fn failures(&self) -> &[DeliveryFailure] { &self.failures }

    /// Whether every addressed session received the payload.
    #[must_use]
    pub fn is_complete(&self) -> bool { self.failures.is_empty() }
}

/// Producer-side capability: resolves send requests into session writes.
///
/// Cheap to clone; every clone dispatches over the same registry.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    config: Arc<EndpointConfig>,
}

impl Dispatcher {
    pub(crate) fn new(registry: Arc<SessionRegistry>, config: Arc<EndpointConfig>) -> Self {
        Self { registry, config }
    }

    /// Resolve and execute one send request.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::MissingTarget`] when the request has no mode and
    /// the endpoint does not broadcast by default, and the targeted-send
    /// errors of [`send_to`](Self::send_to). Broadcast failures are partial
    /// by design and reported through the [`DispatchReport`] instead.
    pub async fn dispatch(&self, request: SendRequest) -> Result<DispatchReport, SendError> {
        let SendRequest { payload, mode } = request;
        let mode = match mode {
            Some(mode) => mode,
            None if self.config.broadcast_default() => SendMode::Broadcast,
            None => return Err(SendError::MissingTarget),
        };
        match mode {
            SendMode::Broadcast => Ok(self.broadcast(payload).await),
            SendMode::Targeted(id) => {
                self.send_to(id, payload).await?;
                Ok(DispatchReport::single())
            }
        }
    }

    /// Deliver one payload to every session open at the time of the call.
    ///
    /// Writes run concurrently, one per session, each serialized behind that
    /// session's queue. The report names every session whose transport
    /// rejected the payload.
    pub async fn broadcast(&self, payload: Frame) -> DispatchReport {
        let sessions = self.registry.snapshot();
        let attempted = sessions.len();
        let writes = sessions.iter().map(|session| {
            let payload = payload.clone();
            async move { (session.id(), session.write(payload).await) }
        });
        let failures: Vec<DeliveryFailure> = join_all(writes)
            .await
            .into_iter()
            .filter_map(|(id, outcome)| outcome.err().map(|error| DeliveryFailure { id, error }))
            .collect();
        debug!(
            attempted,
            failed = failures.len(),
            "broadcast dispatched"
        );
        DispatchReport { attempted, failures }
    }

    /// Deliver one payload to exactly one named session.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::SessionNotFound`] when no session is registered
    /// for `id` (for example, the connection closed between the decision to
    /// send and the send), or [`SendError::Write`] when the transport
    /// rejects the payload. A write failure forces the session closed.
    pub async fn send_to(&self, id: ConnectionId, payload: Frame) -> Result<(), SendError> {
        let session = self
            .registry
            .lookup(id)
            .ok_or(SendError::SessionNotFound(id))?;
        session
            .write(payload)
            .await
            .map_err(|source| SendError::Write { id, source })
    }
}
