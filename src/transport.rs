//! Seam between the session hub and the server that owns the sockets.
//!
//! The HTTP upgrade handshake, wire-level framing, and TLS belong to the
//! embedding transport layer. The hub only needs a write primitive and a
//! close primitive per established connection, expressed here as
//! [`SessionTransport`].

use std::io;

use async_trait::async_trait;
use bytes::Bytes;

/// Payload of a single websocket message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// A text message.
    Text(String),
    /// A binary message.
    Binary(Bytes),
}

impl Frame {
    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(bytes) => bytes.len(),
        }
    }

    /// Whether the payload carries no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl From<&str> for Frame {
    fn from(text: &str) -> Self { Frame::Text(text.to_owned()) }
}

impl From<String> for Frame {
    fn from(text: String) -> Self { Frame::Text(text) }
}

impl From<Bytes> for Frame {
    fn from(bytes: Bytes) -> Self { Frame::Binary(bytes) }
}

impl From<Vec<u8>> for Frame {
    fn from(bytes: Vec<u8>) -> Self { Frame::Binary(Bytes::from(bytes)) }
}

/// Write half of one established connection, provided by the transport layer.
///
/// Implementations are expected to be cheap to share (`Arc`) and to tolerate
/// a `close` after the peer has already disconnected.
#[async_trait]
pub trait SessionTransport: Send + Sync + 'static {
    /// Write a single frame to the peer.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] when the underlying socket rejects the write.
    async fn send_frame(&self, frame: Frame) -> io::Result<()>;

    /// Close the underlying connection. Must be idempotent.
    async fn close(&self);
}
