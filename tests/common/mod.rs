//! Shared fixtures for integration tests: a scriptable transport, a
//! recording pipeline, and endpoint helpers.
#![allow(dead_code)]

use std::{
    io,
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use wshub::{
    ConnectionId, Endpoint, EndpointConfig, Frame, InboundMessage, IntakeError, OpenError,
    RoutingPipeline, Session, SessionSynchronizer, SessionTransport,
};

/// Transport double recording writes and close calls.
///
/// Writes can be delayed and forced to fail to exercise the hub's
/// timeout and forced-close paths.
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<Frame>>,
    closed: AtomicBool,
    fail_writes: AtomicBool,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    pub fn failing() -> Arc<Self> {
        let transport = Self::default();
        transport.fail_writes.store(true, Ordering::SeqCst);
        Arc::new(transport)
    }

    pub fn delayed(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn sent(&self) -> Vec<Frame> { self.sent.lock().expect("sent lock").clone() }

    pub fn is_closed(&self) -> bool { self.closed.load(Ordering::SeqCst) }

    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionTransport for MockTransport {
    async fn send_frame(&self, frame: Frame) -> io::Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure"));
        }
        self.sent.lock().expect("sent lock").push(frame);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Pipeline double recording intaken messages; can refuse them.
#[derive(Default)]
pub struct RecordingPipeline {
    received: Mutex<Vec<InboundMessage>>,
    refuse: AtomicBool,
}

impl RecordingPipeline {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    pub fn refusing() -> Arc<Self> {
        let pipeline = Self::default();
        pipeline.refuse.store(true, Ordering::SeqCst);
        Arc::new(pipeline)
    }

    pub fn received(&self) -> Vec<InboundMessage> {
        self.received.lock().expect("received lock").clone()
    }
}

#[async_trait]
impl RoutingPipeline for RecordingPipeline {
    async fn intake(&self, message: InboundMessage) -> Result<(), IntakeError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(IntakeError::new("pipeline shutting down"));
        }
        self.received.lock().expect("received lock").push(message);
        Ok(())
    }
}

pub fn peer(n: u16) -> SocketAddr {
    format!("10.0.0.{}:{}", n, 40_000 + n).parse().expect("valid peer address")
}

/// An open endpoint with test-friendly timings.
pub fn open_endpoint(broadcast_default: bool) -> Endpoint {
    let endpoint = Endpoint::new(
        EndpointConfig::builder()
            .broadcast_default(broadcast_default)
            .write_timeout(Duration::from_secs(2))
            .shutdown_grace(Duration::from_secs(1))
            .build()
            .expect("test config is valid"),
    );
    endpoint.open();
    endpoint
}

pub async fn open_session(
    synchronizer: &SessionSynchronizer,
    id: u64,
) -> (Arc<Session>, Arc<MockTransport>) {
    let transport = MockTransport::new();
    let session = synchronizer
        .on_open(ConnectionId::new(id), peer(u16::try_from(id).expect("small id")), transport.clone())
        .await
        .expect("open succeeds");
    (session, transport)
}

pub async fn open_session_with(
    synchronizer: &SessionSynchronizer,
    id: u64,
    transport: Arc<MockTransport>,
) -> Result<Arc<Session>, OpenError> {
    synchronizer
        .on_open(ConnectionId::new(id), peer(u16::try_from(id).expect("small id")), transport)
        .await
}

/// Poll `condition` until it holds or a second has passed.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 1s");
}

pub fn text(frame: &str) -> Frame { Frame::Text(frame.to_owned()) }
