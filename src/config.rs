//! Endpoint configuration types.
//!
//! [`EndpointConfig`] is an immutable parameter bundle assembled once per
//! logical endpoint and shared read-only by every component serving it.
//! Validation happens once, at `build`, and reports every violated
//! constraint rather than stopping at the first.

use std::{path::PathBuf, time::Duration};

use thiserror::Error;

/// Default port for a websocket endpoint.
pub const DEFAULT_PORT: u16 = 9292;
/// Default bound on queued outbound frames per session.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
/// Default budget for a single transport write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);
/// Default grace period granted to writer tasks during shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// TLS material carried opaquely to the transport layer.
///
/// The hub never builds a TLS context itself; it only checks that the pair
/// is internally consistent before handing it on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TlsParams {
    /// PEM certificate chain for the listener.
    pub certificate: Option<PathBuf>,
    /// PEM private key matching the certificate.
    pub private_key: Option<PathBuf>,
}

impl TlsParams {
    /// Whether any TLS material was supplied.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.certificate.is_some() || self.private_key.is_some()
    }

    fn is_consistent(&self) -> bool {
        self.certificate.is_some() == self.private_key.is_some()
    }
}

/// A single constraint violated during configuration validation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigViolation {
    /// The port is outside `1..=65535`.
    #[error("port {0} is outside the valid range 1-65535")]
    PortOutOfRange(i64),
    /// The host is empty or whitespace.
    #[error("host must not be empty")]
    EmptyHost,
    /// The base path does not start with `/` or contains whitespace.
    #[error("path {0:?} must start with '/' and contain no whitespace")]
    MalformedPath(String),
    /// Only one half of the certificate/key pair was supplied.
    #[error("TLS parameters must supply both a certificate and a private key")]
    IncompleteTls,
    /// The per-session outbound queue would hold no frames.
    #[error("outbound queue capacity must be at least 1")]
    ZeroQueueCapacity,
    /// Transport writes would time out immediately.
    #[error("write timeout must be non-zero")]
    ZeroWriteTimeout,
}

/// Construction-time validation failure listing every violated constraint.
#[derive(Debug)]
pub struct ConfigError {
    violations: Vec<ConfigViolation>,
}

impl ConfigError {
    /// Every constraint the configuration violated.
    #[must_use]
    pub fn violations(&self) -> &[ConfigViolation] { &self.violations }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("invalid endpoint configuration: ")?;
        for (index, violation) in self.violations.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigError {}

/// Immutable parameter bundle for one logical websocket endpoint.
#[derive(Clone, Debug)]
pub struct EndpointConfig {
    host: String,
    port: u16,
    path: String,
    tls: TlsParams,
    broadcast_default: bool,
    diagnostics: bool,
    queue_capacity: usize,
    write_timeout: Duration,
    shutdown_grace: Duration,
}

impl EndpointConfig {
    /// Start building a configuration from the defaults.
    #[must_use]
    pub fn builder() -> EndpointConfigBuilder { EndpointConfigBuilder::default() }

    /// Hostname or address the transport listener binds.
    #[must_use]
    pub fn host(&self) -> &str { &self.host }

    /// Listener port.
    #[must_use]
    pub fn port(&self) -> u16 { self.port }

    /// Base resource path of the endpoint.
    #[must_use]
    pub fn path(&self) -> &str { &self.path }

    /// TLS material passed through to the transport layer.
    #[must_use]
    pub fn tls(&self) -> &TlsParams { &self.tls }

    /// URI scheme implied by the TLS parameters.
    #[must_use]
    pub fn scheme(&self) -> &'static str {
        if self.tls.is_enabled() { "wss" } else { "ws" }
    }

    /// Whether sends without an explicit mode broadcast to all sessions.
    #[must_use]
    pub fn broadcast_default(&self) -> bool { self.broadcast_default }

    /// Whether diagnostics reporting was requested for this endpoint.
    #[must_use]
    pub fn diagnostics_enabled(&self) -> bool { self.diagnostics }

    /// Bound on queued outbound frames per session.
    #[must_use]
    pub fn queue_capacity(&self) -> usize { self.queue_capacity }

    /// Budget for a single transport write.
    #[must_use]
    pub fn write_timeout(&self) -> Duration { self.write_timeout }

    /// Grace period granted to writer tasks during shutdown.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration { self.shutdown_grace }
}

/// Builder for [`EndpointConfig`].
#[derive(Clone, Debug)]
pub struct EndpointConfigBuilder {
    host: String,
    port: i64,
    path: String,
    tls: TlsParams,
    broadcast_default: bool,
    diagnostics: bool,
    queue_capacity: usize,
    write_timeout: Duration,
    shutdown_grace: Duration,
}

impl Default for EndpointConfigBuilder {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: i64::from(DEFAULT_PORT),
            path: "/".to_owned(),
            tls: TlsParams::default(),
            broadcast_default: false,
            diagnostics: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl EndpointConfigBuilder {
    /// Set the hostname or address the transport listener binds.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the listener port.
    ///
    /// Accepts any integer so that out-of-range values surface through
    /// validation instead of a conversion panic at the call site.
    #[must_use]
    pub fn port(mut self, port: i64) -> Self {
        self.port = port;
        self
    }

    /// Set the base resource path.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Supply TLS material for the transport layer.
    #[must_use]
    pub fn tls(mut self, tls: TlsParams) -> Self {
        self.tls = tls;
        self
    }

    /// Broadcast sends without an explicit mode to every open session.
    #[must_use]
    pub fn broadcast_default(mut self, broadcast: bool) -> Self {
        self.broadcast_default = broadcast;
        self
    }

    /// Request diagnostics reporting for this endpoint.
    #[must_use]
    pub fn diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    /// Bound the per-session outbound queue.
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Budget a single transport write.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Grace period granted to writer tasks during shutdown.
    #[must_use]
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Validate and freeze the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] listing every violated constraint, so
    /// operators see all problems in one diagnostic pass.
    pub fn build(self) -> Result<EndpointConfig, ConfigError> {
        let mut violations = Vec::new();

        if self.host.trim().is_empty() {
            violations.push(ConfigViolation::EmptyHost);
        }
        let port = u16::try_from(self.port).ok().filter(|port| *port != 0);
        if port.is_none() {
            violations.push(ConfigViolation::PortOutOfRange(self.port));
        }
        if !self.path.starts_with('/') || self.path.contains(char::is_whitespace) {
            violations.push(ConfigViolation::MalformedPath(self.path.clone()));
        }
        if !self.tls.is_consistent() {
            violations.push(ConfigViolation::IncompleteTls);
        }
        if self.queue_capacity == 0 {
            violations.push(ConfigViolation::ZeroQueueCapacity);
        }
        if self.write_timeout.is_zero() {
            violations.push(ConfigViolation::ZeroWriteTimeout);
        }

        if let Some(port) = port {
            if violations.is_empty() {
                return Ok(EndpointConfig {
                    host: self.host,
                    port,
                    path: self.path,
                    tls: self.tls,
                    broadcast_default: self.broadcast_default,
                    diagnostics: self.diagnostics,
                    queue_capacity: self.queue_capacity,
                    write_timeout: self.write_timeout,
                    shutdown_grace: self.shutdown_grace,
                });
            }
        }
        Err(ConfigError { violations })
    }
}
