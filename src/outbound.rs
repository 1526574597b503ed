//! Per-session outbound delivery.
//!
//! Each session owns a bounded FIFO queue drained by a single writer task,
//! so writes to one session are serialized in enqueue order and a slow
//! client contends only with itself. Every queued frame carries a oneshot
//! ack, letting dispatchers observe the transport outcome of each write.

use std::{sync::Arc, time::Duration};

use log::{debug, warn};
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    time::timeout,
};

use crate::{
    session::{Session, SessionRegistry},
    transport::{Frame, SessionTransport},
};

/// Errors produced while delivering a frame to a session's transport.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The transport rejected the write.
    #[error("transport write failed: {0}")]
    Io(#[from] std::io::Error),
    /// The transport did not complete the write within the configured budget.
    #[error("transport write timed out after {0:?}")]
    Timeout(Duration),
    /// The session was closed before the frame reached the transport.
    #[error("session closed")]
    Closed,
}

/// One queued outbound frame and the channel its outcome is reported on.
pub(crate) struct Outbound {
    frame: Frame,
    ack: oneshot::Sender<Result<(), WriteError>>,
}

/// Sending side of a session's outbound queue.
#[derive(Clone, Debug)]
pub(crate) struct WriteHandle {
    tx: mpsc::Sender<Outbound>,
}

impl WriteHandle {
    /// Create a bounded outbound queue and its write handle.
    pub(crate) fn channel(capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Queue a frame and await the transport outcome.
    ///
    /// Awaits while the queue is at capacity; resolves to
    /// [`WriteError::Closed`] once the writer task has stopped.
    pub(crate) async fn write(&self, frame: Frame) -> Result<(), WriteError> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Outbound { frame, ack })
            .await
            .map_err(|_| WriteError::Closed)?;
        done.await.map_err(|_| WriteError::Closed)?
    }
}

/// Why a writer task stopped.
#[derive(Clone, Copy, Debug)]
enum Stop {
    /// The session was closed: peer disconnect or endpoint shutdown.
    Closed,
    /// A transport write failed and the session is forced closed.
    WriteFailed,
    /// Every write handle was dropped.
    Released,
}

/// Task draining one session's outbound queue into its transport.
///
/// Exactly one writer runs per session. On any exit path it closes the
/// transport and removes its own registry entry, so no write is attempted
/// against a dead handle.
pub(crate) struct SessionWriter {
    session: Arc<Session>,
    rx: mpsc::Receiver<Outbound>,
    transport: Arc<dyn SessionTransport>,
    registry: Arc<SessionRegistry>,
    write_timeout: Duration,
}

impl SessionWriter {
    pub(crate) fn new(
        session: Arc<Session>,
        rx: mpsc::Receiver<Outbound>,
        transport: Arc<dyn SessionTransport>,
        registry: Arc<SessionRegistry>,
        write_timeout: Duration,
    ) -> Self {
        Self {
            session,
            rx,
            transport,
            registry,
            write_timeout,
        }
    }

    pub(crate) async fn run(mut self) {
        let closed = self.session.closed_token().clone();
        let stop = loop {
            tokio::select! {
                biased;
                () = closed.cancelled() => break Stop::Closed,
                next = self.rx.recv() => match next {
                    Some(out) => {
                        if !self.deliver(out).await {
                            break Stop::WriteFailed;
                        }
                    }
                    None => break Stop::Released,
                },
            }
        };
        if matches!(stop, Stop::Closed) {
            self.drain().await;
        }
        self.finish(stop).await;
    }

    /// Write one queued frame, acking the caller with the outcome.
    ///
    /// Returns `false` when the transport write failed or timed out.
    async fn deliver(&mut self, out: Outbound) -> bool {
        let outcome = match timeout(self.write_timeout, self.transport.send_frame(out.frame)).await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(WriteError::Io(source)),
            Err(_) => Err(WriteError::Timeout(self.write_timeout)),
        };
        let delivered = outcome.is_ok();
        if delivered {
            crate::metrics::inc_frames(crate::metrics::Direction::Outbound);
        }
        // The caller may have stopped waiting for the ack.
        let _ = out.ack.send(outcome);
        delivered
    }

    /// Flush frames that were queued before the close was observed.
    ///
    /// Stops early if the transport fails; refused frames resolve to
    /// [`WriteError::Closed`] when their acks are dropped.
    async fn drain(&mut self) {
        self.rx.close();
        while let Some(out) = self.rx.recv().await {
            if !self.deliver(out).await {
                return;
            }
        }
    }

    async fn finish(mut self, stop: Stop) {
        self.rx.close();
        self.session.mark_closed();
        self.transport.close().await;
        let removed = self
            .registry
            .unregister_exact(self.session.id(), &self.session);
        crate::metrics::dec_sessions();
        match stop {
            Stop::WriteFailed => warn!(
                "session forced closed after write failure: conn={}, peer={}",
                self.session.id(),
                self.session.peer_addr(),
            ),
            Stop::Closed | Stop::Released => debug!(
                "session writer stopped: conn={}, removed={removed}",
                self.session.id(),
            ),
        }
    }
}
