//! Session registry and broadcast dispatch core for websocket endpoints.
//!
//! `wshub` supplies the concurrency core a websocket integration endpoint
//! delegates to: a thread-safe session registry, per-session FIFO outbound
//! delivery, broadcast and targeted dispatch, and inbound bridging into a
//! host routing pipeline. The HTTP upgrade handshake, socket I/O, and TLS
//! context belong to the embedding transport layer, reached through the
//! [`transport`] seam.

pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod endpoint;
pub mod metrics;
pub mod outbound;
pub mod session;
pub mod sync;
pub mod transport;

pub use bridge::{InboundBridge, InboundMessage, IntakeError, RoutingPipeline};
pub use config::{ConfigError, ConfigViolation, EndpointConfig, TlsParams};
pub use dispatch::{DeliveryFailure, DispatchReport, Dispatcher, SendError, SendMode, SendRequest};
pub use endpoint::Endpoint;
pub use metrics::{Direction, ERRORS_TOTAL, FRAMES_PROCESSED, SESSIONS_ACTIVE};
pub use outbound::WriteError;
pub use session::{ConnectionId, DuplicateSessionError, Session, SessionRegistry};
pub use sync::{OpenError, SessionSynchronizer};
pub use transport::{Frame, SessionTransport};
