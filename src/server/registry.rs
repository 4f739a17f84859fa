//! Connection registry.
//!
//! Holds the relay's live peer connections in insertion order. Removal is
//! split into two passes: [`ConnectionRegistry::mark_dead`] (or
//! [`Connection::mark_dead`] from inside an iteration) only flags an entry,
//! and [`ConnectionRegistry::purge_dead`] removes flagged entries later.
//! A broadcast therefore never sees the registry shrink or reorder while it
//! is walking it.

use std::fmt;
use std::net::SocketAddr;

use thiserror::Error;
use tracing::info;

/// Registry errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A connection with this handle is already registered.
    #[error("duplicate connection handle: {0}")]
    DuplicateHandle(ConnectionId),
}

/// Handle identifying one accepted connection.
///
/// Handles are assigned by the relay from a counter and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Create a handle from a raw value.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for ConnectionId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Connection liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Liveness {
    /// Connection is usable.
    Live,
    /// Connection failed or closed; waiting to be purged.
    Dead,
}

/// One registered peer connection.
///
/// Generic over the transport state `T` the relay keeps per peer.
#[derive(Debug)]
pub struct Connection<T> {
    id: ConnectionId,
    peer: SocketAddr,
    liveness: Liveness,
    transport: T,
}

impl<T> Connection<T> {
    /// Create a live connection.
    pub fn new(id: ConnectionId, peer: SocketAddr, transport: T) -> Self {
        Self {
            id,
            peer,
            liveness: Liveness::Live,
            transport,
        }
    }

    /// Connection handle.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Remote address and port.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Whether the connection is still live.
    pub fn is_live(&self) -> bool {
        self.liveness == Liveness::Live
    }

    /// Flag the connection dead. It stays registered until the next purge.
    pub fn mark_dead(&mut self) {
        self.liveness = Liveness::Dead;
    }

    /// Per-peer transport state.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable per-peer transport state.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

/// Ordered set of peer connections.
#[derive(Debug)]
pub struct ConnectionRegistry<T> {
    entries: Vec<Connection<T>>,
}

impl<T> ConnectionRegistry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a new connection.
    pub fn register(&mut self, connection: Connection<T>) -> Result<(), RegistryError> {
        if self.contains(connection.id) {
            return Err(RegistryError::DuplicateHandle(connection.id));
        }
        self.entries.push(connection);
        Ok(())
    }

    /// Call `f` with every live connection except `origin`, in registry order.
    ///
    /// `f` may mark the connection it is given dead; the registry itself is
    /// not resized during the walk.
    pub fn for_each_except<F>(&mut self, origin: ConnectionId, mut f: F)
    where
        F: FnMut(&mut Connection<T>),
    {
        for conn in self.entries.iter_mut() {
            if conn.id == origin || !conn.is_live() {
                continue;
            }
            f(conn);
        }
    }

    /// Flag a connection dead. Returns `false` if the handle is unknown.
    pub fn mark_dead(&mut self, id: ConnectionId) -> bool {
        match self.get_mut(id) {
            Some(conn) => {
                conn.mark_dead();
                true
            }
            None => false,
        }
    }

    /// Remove every dead connection, keeping the order of the rest.
    ///
    /// Each removed connection is logged as a disconnect and returned.
    pub fn purge_dead(&mut self) -> Vec<Connection<T>> {
        if self.entries.iter().all(Connection::is_live) {
            return Vec::new();
        }

        let (dead, live): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|c| !c.is_live());
        self.entries = live;

        for conn in &dead {
            info!(
                id = %conn.id,
                address = %conn.peer.ip(),
                port = conn.peer.port(),
                "Peer disconnected"
            );
        }
        dead
    }

    /// Whether a handle is registered (live or dead).
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.entries.iter().any(|c| c.id == id)
    }

    /// Look up a connection.
    pub fn get(&self, id: ConnectionId) -> Option<&Connection<T>> {
        self.entries.iter().find(|c| c.id == id)
    }

    /// Look up a connection mutably.
    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Connection<T>> {
        self.entries.iter_mut().find(|c| c.id == id)
    }

    /// Iterate live connections in registry order.
    pub fn iter_live(&self) -> impl Iterator<Item = &Connection<T>> {
        self.entries.iter().filter(|c| c.is_live())
    }

    /// Iterate live connections mutably in registry order.
    pub fn iter_live_mut(&mut self) -> impl Iterator<Item = &mut Connection<T>> {
        self.entries.iter_mut().filter(|c| c.is_live())
    }

    /// Handles of all registered connections, in order.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.entries.iter().map(|c| c.id).collect()
    }

    /// Number of registered connections, including ones awaiting purge.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Number of live connections.
    pub fn live_count(&self) -> usize {
        self.iter_live().count()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for ConnectionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    /// Registry whose transport is the list of payloads "sent" to that peer.
    fn registry_of(n: u64) -> ConnectionRegistry<Vec<&'static str>> {
        let mut registry = ConnectionRegistry::new();
        for i in 1..=n {
            registry
                .register(Connection::new(ConnectionId::new(i), addr(5000 + i as u16), Vec::new()))
                .unwrap();
        }
        registry
    }

    fn send_all(registry: &mut ConnectionRegistry<Vec<&'static str>>, from: u64, msg: &'static str) {
        registry.for_each_except(ConnectionId::new(from), |conn| {
            conn.transport_mut().push(msg);
        });
    }

    fn received(registry: &ConnectionRegistry<Vec<&'static str>>, id: u64) -> Vec<&'static str> {
        registry
            .get(ConnectionId::new(id))
            .map(|c| c.transport().clone())
            .unwrap_or_default()
    }

    #[test]
    fn test_register_and_order() {
        let registry = registry_of(3);
        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.ids(),
            vec![ConnectionId::new(1), ConnectionId::new(2), ConnectionId::new(3)]
        );
        assert_eq!(registry.get(ConnectionId::new(2)).unwrap().peer(), addr(5002));
    }

    #[test]
    fn test_duplicate_handle_rejected() {
        let mut registry = registry_of(1);
        let dup = Connection::new(ConnectionId::new(1), addr(9999), Vec::new());
        assert_eq!(
            registry.register(dup),
            Err(RegistryError::DuplicateHandle(ConnectionId::new(1)))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_broadcast_excludes_origin() {
        let mut registry = registry_of(3);
        send_all(&mut registry, 1, "hello");

        assert!(received(&registry, 1).is_empty());
        assert_eq!(received(&registry, 2), vec!["hello"]);
        assert_eq!(received(&registry, 3), vec!["hello"]);
    }

    #[test]
    fn test_broadcast_visits_in_registry_order() {
        let mut registry = registry_of(4);
        let mut visited = Vec::new();
        registry.for_each_except(ConnectionId::new(2), |conn| visited.push(conn.id().as_u64()));
        assert_eq!(visited, vec![1, 3, 4]);
    }

    #[test]
    fn test_dead_connection_skipped_then_purged() {
        let mut registry = registry_of(3);

        assert!(registry.mark_dead(ConnectionId::new(2)));
        send_all(&mut registry, 1, "after");

        assert!(received(&registry, 2).is_empty());
        assert_eq!(received(&registry, 3), vec!["after"]);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.live_count(), 2);

        let removed = registry.purge_dead();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id(), ConnectionId::new(2));
        assert_eq!(removed[0].peer(), addr(5002));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.ids(), vec![ConnectionId::new(1), ConnectionId::new(3)]);
    }

    #[test]
    fn test_mark_dead_during_iteration() {
        let mut registry = registry_of(4);

        // Simulate a send failure to peer 3 discovered mid-broadcast
        registry.for_each_except(ConnectionId::new(1), |conn| {
            if conn.id() == ConnectionId::new(3) {
                conn.mark_dead();
            } else {
                conn.transport_mut().push("msg");
            }
        });

        // Walk completed over every peer; nothing removed yet
        assert_eq!(registry.len(), 4);
        assert_eq!(received(&registry, 2), vec!["msg"]);
        assert_eq!(received(&registry, 4), vec!["msg"]);

        let removed = registry.purge_dead();
        assert_eq!(removed.len(), 1);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_purge_count_matches_marked() {
        let mut registry = registry_of(6);
        for id in [2, 4, 5] {
            registry.mark_dead(ConnectionId::new(id));
        }
        let before = registry.len();
        let removed = registry.purge_dead();
        assert_eq!(removed.len(), 3);
        assert_eq!(registry.len(), before - 3);
        assert!(registry.iter_live().all(Connection::is_live));

        // Nothing left to purge
        assert!(registry.purge_dead().is_empty());
    }

    #[test]
    fn test_mark_unknown_handle() {
        let mut registry = registry_of(1);
        assert!(!registry.mark_dead(ConnectionId::new(42)));
    }

    #[test]
    fn test_handle_reusable_after_purge() {
        let mut registry = registry_of(2);
        registry.mark_dead(ConnectionId::new(2));
        registry.purge_dead();

        let again = Connection::new(ConnectionId::new(2), addr(7000), Vec::new());
        assert!(registry.register(again).is_ok());
        assert_eq!(registry.ids(), vec![ConnectionId::new(1), ConnectionId::new(2)]);
    }
}
