//! Registry of live websocket sessions.
//!
//! `SessionRegistry` is the single shared mutable structure in the hub: the
//! transport layer inserts and removes entries through the synchronizer while
//! dispatchers read them concurrently. Membership reflects only
//! currently-open connections.

use std::{net::SocketAddr, sync::Arc, time::SystemTime};

use dashmap::{DashMap, mapref::entry::Entry};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{
    outbound::{WriteError, WriteHandle},
    transport::Frame,
};

/// Identifier assigned to a connection by the transport layer.
///
/// Opaque and unique for the lifetime of the connection; the transport must
/// not reuse an identifier while its connection is still open.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl From<u64> for ConnectionId {
    fn from(value: u64) -> Self { Self(value) }
}

impl ConnectionId {
    /// Create a new [`ConnectionId`] with the provided value.
    #[must_use]
    pub fn new(id: u64) -> Self { Self(id) }

    /// Return the inner `u64` representation.
    #[must_use]
    pub fn as_u64(&self) -> u64 { self.0 }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One live client connection and its write handle.
///
/// Owned by the [`SessionRegistry`]; dispatchers hold short-lived `Arc`
/// references during a send. The write handle is valid exactly between the
/// open and close notifications: once the session is closed, queued and new
/// writes resolve to [`WriteError::Closed`].
pub struct Session {
    id: ConnectionId,
    peer_addr: SocketAddr,
    opened_at: SystemTime,
    writer: WriteHandle,
    closed: CancellationToken,
}

impl Session {
    pub(crate) fn new(
        id: ConnectionId,
        peer_addr: SocketAddr,
        writer: WriteHandle,
        closed: CancellationToken,
    ) -> Self {
        Self {
            id,
            peer_addr,
            opened_at: SystemTime::now(),
            writer,
            closed,
        }
    }

    /// Identifier reported by the transport layer for this connection.
    #[must_use]
    pub fn id(&self) -> ConnectionId { self.id }

    /// Remote address of the peer.
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr { self.peer_addr }

    /// Instant at which the open notification was processed.
    #[must_use]
    pub fn opened_at(&self) -> SystemTime { self.opened_at }

    /// Whether the session has been closed and writes are no longer accepted.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.closed.is_cancelled() }

    /// Queue one frame for delivery and await the transport outcome.
    ///
    /// Frames queued on the same session are written in enqueue order.
    ///
    /// # Errors
    ///
    /// Returns a [`WriteError`] when the session is closed or the transport
    /// rejects the write.
    pub async fn write(&self, frame: Frame) -> Result<(), WriteError> {
        if self.closed.is_cancelled() {
            return Err(WriteError::Closed);
        }
        self.writer.write(frame).await
    }

    pub(crate) fn mark_closed(&self) { self.closed.cancel(); }

    pub(crate) fn closed_token(&self) -> &CancellationToken { &self.closed }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Error returned when the transport reports an open for an identifier that
/// is still registered.
#[derive(Debug, Error)]
#[error("a session for {id} is already registered")]
pub struct DuplicateSessionError {
    /// Identifier the transport attempted to reuse.
    pub id: ConnectionId,
}

/// Concurrent registry of open sessions keyed by [`ConnectionId`].
#[derive(Default)]
pub struct SessionRegistry(DashMap<ConnectionId, Arc<Session>>);

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Insert a session for a newly established connection.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateSessionError`] if a session for the same identifier
    /// is still registered; the existing entry is left untouched.
    pub fn register(&self, session: Arc<Session>) -> Result<(), DuplicateSessionError> {
        match self.0.entry(session.id()) {
            Entry::Occupied(entry) => Err(DuplicateSessionError { id: *entry.key() }),
            Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(())
            }
        }
    }

    /// Remove the session for `id`, returning it if one was registered.
    ///
    /// Absent identifiers are a no-op: close notifications may race with a
    /// prior forced removal.
    pub fn unregister(&self, id: ConnectionId) -> Option<Arc<Session>> {
        self.0.remove(&id).map(|(_, session)| session)
    }

    /// Remove the entry for `id` only if it still holds `expected`.
    ///
    /// Writer tasks clean up with this so that a late removal cannot evict a
    /// new session that reused the identifier after the old one was removed.
    pub(crate) fn unregister_exact(&self, id: ConnectionId, expected: &Arc<Session>) -> bool {
        self.0
            .remove_if(&id, |_, stored| Arc::ptr_eq(stored, expected))
            .is_some()
    }

    /// Look up the session registered for `id`.
    #[must_use]
    pub fn lookup(&self, id: ConnectionId) -> Option<Arc<Session>> {
        self.0.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Collect the sessions open at the time of the call.
    ///
    /// Used by broadcast: an entry inserted or removed concurrently with the
    /// call may or may not appear, but no entry appears half-initialized.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        self.0.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    /// Number of currently registered sessions.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Whether no sessions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;

    fn test_session(id: u64) -> Arc<Session> {
        let (writer, _rx) = WriteHandle::channel(1);
        Arc::new(Session::new(
            ConnectionId::new(id),
            "127.0.0.1:9292".parse().expect("valid test address"),
            writer,
            CancellationToken::new(),
        ))
    }

    #[rstest]
    fn lookup_returns_registered_session() {
        let registry = SessionRegistry::new();
        let session = test_session(1);
        registry
            .register(Arc::clone(&session))
            .expect("first register succeeds");

        let found = registry.lookup(ConnectionId::new(1)).expect("session present");
        assert!(Arc::ptr_eq(&found, &session));
        assert_eq!(registry.len(), 1);
    }

    #[rstest]
    fn lookup_after_unregister_returns_none() {
        let registry = SessionRegistry::new();
        registry.register(test_session(7)).expect("register succeeds");

        assert!(registry.unregister(ConnectionId::new(7)).is_some());
        assert!(registry.lookup(ConnectionId::new(7)).is_none());
        assert!(registry.is_empty());
    }

    #[rstest]
    fn unregister_absent_id_is_a_no_op() {
        let registry = SessionRegistry::new();
        assert!(registry.unregister(ConnectionId::new(42)).is_none());
    }

    #[rstest]
    fn duplicate_register_fails_and_keeps_existing_entry() {
        let registry = SessionRegistry::new();
        let original = test_session(3);
        registry
            .register(Arc::clone(&original))
            .expect("first register succeeds");

        let error = registry
            .register(test_session(3))
            .expect_err("second register must fail");
        assert_eq!(error.id, ConnectionId::new(3));

        let stored = registry.lookup(ConnectionId::new(3)).expect("entry survives");
        assert!(Arc::ptr_eq(&stored, &original));
    }

    #[rstest]
    fn snapshot_reflects_current_membership() {
        let registry = SessionRegistry::new();
        for id in 1..=3 {
            registry.register(test_session(id)).expect("register succeeds");
        }
        registry.unregister(ConnectionId::new(2));

        let mut ids: Vec<u64> = registry.snapshot().iter().map(|s| s.id().as_u64()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 3]);
    }

    #[rstest]
    fn unregister_exact_ignores_a_replacement_session() {
        let registry = SessionRegistry::new();
        let first = test_session(5);
        registry.register(Arc::clone(&first)).expect("register succeeds");
        registry.unregister(ConnectionId::new(5));

        let second = test_session(5);
        registry.register(Arc::clone(&second)).expect("id is free again");

        assert!(!registry.unregister_exact(ConnectionId::new(5), &first));
        let stored = registry.lookup(ConnectionId::new(5)).expect("replacement survives");
        assert!(Arc::ptr_eq(&stored, &second));
    }

    #[derive(Clone, Debug)]
    enum Op {
        Register(u64),
        Unregister(u64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u64..16).prop_map(Op::Register),
            (0u64..16).prop_map(Op::Unregister),
        ]
    }

    proptest! {
        /// The registry agrees with a sequential map model for any sequence
        /// of register/unregister calls.
        #[test]
        fn registry_matches_map_model(ops in proptest::collection::vec(op_strategy(), 0..64)) {
            let registry = SessionRegistry::new();
            let mut model: HashMap<u64, Arc<Session>> = HashMap::new();

            for op in ops {
                match op {
                    Op::Register(id) => {
                        let session = test_session(id);
                        let registered = registry.register(Arc::clone(&session)).is_ok();
                        let modeled = !model.contains_key(&id);
                        prop_assert_eq!(registered, modeled);
                        if modeled {
                            model.insert(id, session);
                        }
                    }
                    Op::Unregister(id) => {
                        let removed = registry.unregister(ConnectionId::new(id)).is_some();
                        prop_assert_eq!(removed, model.remove(&id).is_some());
                    }
                }
            }

            prop_assert_eq!(registry.len(), model.len());
            for (id, session) in &model {
                let stored = registry.lookup(ConnectionId::new(*id));
                prop_assert!(stored.is_some_and(|s| Arc::ptr_eq(&s, session)));
            }
        }
    }
}
