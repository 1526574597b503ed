//! Lifecycle synchronization between the transport layer and the registry.
//!
//! The transport layer reports connection events here. Each connection moves
//! through `Connecting -> Open -> Closed`; the synchronizer keeps the
//! registry consistent across those transitions and never lets a failure
//! escape back across the transport boundary.

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use thiserror::Error;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info, warn};

use crate::{
    config::EndpointConfig,
    outbound::{SessionWriter, WriteHandle},
    session::{ConnectionId, DuplicateSessionError, Session, SessionRegistry},
    transport::SessionTransport,
};

/// Errors reported for a refused open notification.
///
/// Both variants are fatal for the affected connection only; the transport
/// handle is closed before the error is returned.
#[derive(Debug, Error)]
pub enum OpenError {
    /// The transport reported an identifier that is still registered.
    #[error(transparent)]
    Duplicate(#[from] DuplicateSessionError),
    /// The endpoint has begun shutting down and accepts no new sessions.
    #[error("endpoint is shutting down")]
    ShuttingDown,
}

/// Keeps the [`SessionRegistry`] consistent with transport lifecycle events.
pub struct SessionSynchronizer {
    registry: Arc<SessionRegistry>,
    config: Arc<EndpointConfig>,
    accepting: AtomicBool,
    shutdown: CancellationToken,
    writers: TaskTracker,
}

impl SessionSynchronizer {
    pub(crate) fn new(registry: Arc<SessionRegistry>, config: Arc<EndpointConfig>) -> Self {
        Self {
            registry,
            config,
            accepting: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            writers: TaskTracker::new(),
        }
    }

    /// Begin accepting open notifications.
    ///
    /// A synchronizer that has already shut down stays closed; endpoints are
    /// not reopened.
    pub(crate) fn start(&self) {
        if self.shutdown.is_cancelled() {
            warn!("endpoint already shut down; refusing to reopen");
            return;
        }
        self.accepting.store(true, Ordering::Release);
    }

    /// Whether open notifications are currently accepted.
    #[must_use]
    pub fn is_accepting(&self) -> bool { self.accepting.load(Ordering::Acquire) }

    /// Handle a transport-reported connect: register the session and spawn
    /// its writer task.
    ///
    /// # Errors
    ///
    /// Returns an [`OpenError`] when the endpoint is shutting down or the
    /// identifier is still registered. Either way the offered transport is
    /// closed; the failure is fatal for that connection, not the process.
    pub async fn on_open(
        &self,
        id: ConnectionId,
        peer_addr: SocketAddr,
        transport: Arc<dyn SessionTransport>,
    ) -> Result<Arc<Session>, OpenError> {
        if !self.is_accepting() {
            transport.close().await;
            return Err(OpenError::ShuttingDown);
        }

        let (writer, queue) = WriteHandle::channel(self.config.queue_capacity());
        let session = Arc::new(Session::new(
            id,
            peer_addr,
            writer,
            self.shutdown.child_token(),
        ));
        if let Err(duplicate) = self.registry.register(Arc::clone(&session)) {
            error!(conn = %id, peer = %peer_addr, "transport reported a duplicate connection id");
            transport.close().await;
            return Err(OpenError::Duplicate(duplicate));
        }

        self.writers.spawn(
            SessionWriter::new(
                Arc::clone(&session),
                queue,
                transport,
                Arc::clone(&self.registry),
                self.config.write_timeout(),
            )
            .run(),
        );
        crate::metrics::inc_sessions();
        info!(conn = %id, peer = %peer_addr, "session opened");
        Ok(session)
    }

    /// Handle a transport-reported close. Idempotent; a close without a
    /// prior open is logged and ignored.
    pub async fn on_close(&self, id: ConnectionId) {
        match self.registry.unregister(id) {
            Some(session) => {
                session.mark_closed();
                info!(conn = %id, "session closed");
            }
            None => debug!(conn = %id, "close for unknown session ignored"),
        }
    }

    /// Shut the endpoint down.
    ///
    /// Stops accepting opens, cancels every live session so its writer
    /// drains queued frames and closes its transport, then waits up to the
    /// configured grace period before abandoning the remainder.
    pub async fn shutdown(&self) {
        self.accepting.store(false, Ordering::Release);
        self.shutdown.cancel();
        self.writers.close();
        let grace = self.config.shutdown_grace();
        if tokio::time::timeout(grace, self.writers.wait()).await.is_err() {
            warn!(
                pending = self.writers.len(),
                ?grace,
                "grace period expired; abandoning writer tasks"
            );
        }
    }
}
