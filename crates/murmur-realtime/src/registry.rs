//! Process-wide map of who is reachable right now.
//!
//! One entry per user. A newer connection replaces the older one; the older
//! socket stays open until it closes on its own, but is no longer the
//! user's registered handle.

use std::collections::HashMap;

use murmur_core::{ConnectionId, UserId};
use parking_lot::RwLock;

use crate::connection::ConnectionHandle;
use crate::events::ServerEvent;

/// Registry of the current connection of each online user.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<UserId, ConnectionHandle>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `handle` the user's current connection.
    ///
    /// Returns the handle it replaced, if any.
    pub fn register(&self, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        self.connections.write().insert(handle.user_id(), handle)
    }

    /// Remove the user's entry, but only if it still points at
    /// `connection_id`.
    ///
    /// Returns `true` if the entry was removed.
    pub fn unregister(&self, user_id: UserId, connection_id: ConnectionId) -> bool {
        let mut connections = self.connections.write();
        match connections.get(&user_id) {
            Some(current) if current.id() == connection_id => {
                connections.remove(&user_id);
                true
            }
            _ => false,
        }
    }

    /// Get the user's current connection.
    #[must_use]
    pub fn lookup(&self, user_id: UserId) -> Option<ConnectionHandle> {
        self.connections.read().get(&user_id).cloned()
    }

    /// Whether the user has a registered connection.
    #[must_use]
    pub fn is_online(&self, user_id: UserId) -> bool {
        self.connections.read().contains_key(&user_id)
    }

    /// Queue an event to the user's current connection.
    ///
    /// Returns `false` if the user is offline or the event was dropped.
    pub fn send_to_user(&self, user_id: UserId, event: ServerEvent) -> bool {
        self.connections
            .read()
            .get(&user_id)
            .is_some_and(|handle| handle.send(event))
    }

    /// Filter `user_ids` down to those with a registered connection,
    /// preserving order.
    #[must_use]
    pub fn online_among(&self, user_ids: &[UserId]) -> Vec<UserId> {
        let connections = self.connections.read();
        user_ids
            .iter()
            .copied()
            .filter(|id| connections.contains_key(id))
            .collect()
    }

    /// Number of online users.
    #[must_use]
    pub fn online_count(&self) -> usize {
        self.connections.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup() {
        let registry = ConnectionRegistry::new();
        let user_id = UserId::new(1);
        let (handle, _rx) = ConnectionHandle::channel(user_id, 4);

        assert!(!registry.is_online(user_id));
        assert!(registry.register(handle.clone()).is_none());

        assert!(registry.is_online(user_id));
        assert_eq!(registry.lookup(user_id).unwrap().id(), handle.id());
        assert_eq!(registry.online_count(), 1);
    }

    #[test]
    fn newer_connection_replaces_older() {
        let registry = ConnectionRegistry::new();
        let user_id = UserId::new(1);
        let (first, _rx1) = ConnectionHandle::channel(user_id, 4);
        let (second, _rx2) = ConnectionHandle::channel(user_id, 4);

        registry.register(first.clone());
        let evicted = registry.register(second.clone()).unwrap();
        assert_eq!(evicted.id(), first.id());
        assert_eq!(registry.lookup(user_id).unwrap().id(), second.id());
        assert_eq!(registry.online_count(), 1);
    }

    #[test]
    fn stale_unregister_is_ignored() {
        let registry = ConnectionRegistry::new();
        let user_id = UserId::new(1);
        let (first, _rx1) = ConnectionHandle::channel(user_id, 4);
        let (second, _rx2) = ConnectionHandle::channel(user_id, 4);

        registry.register(first.clone());
        registry.register(second.clone());

        // The superseded socket closing must not take the user offline
        assert!(!registry.unregister(user_id, first.id()));
        assert!(registry.is_online(user_id));

        assert!(registry.unregister(user_id, second.id()));
        assert!(!registry.is_online(user_id));
        assert_eq!(registry.online_count(), 0);
    }

    #[test]
    fn send_to_user_reaches_current_connection_only() {
        let registry = ConnectionRegistry::new();
        let user_id = UserId::new(1);
        let (first, mut rx1) = ConnectionHandle::channel(user_id, 4);
        let (second, mut rx2) = ConnectionHandle::channel(user_id, 4);
        registry.register(first);
        registry.register(second);

        assert!(registry.send_to_user(user_id, ServerEvent::error("hi")));
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_ok());

        assert!(!registry.send_to_user(UserId::new(2), ServerEvent::error("nobody")));
    }

    #[test]
    fn online_among_filters_offline_users() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = ConnectionHandle::channel(UserId::new(1), 4);
        let (c, _rx_c) = ConnectionHandle::channel(UserId::new(3), 4);
        registry.register(a);
        registry.register(c);

        let online = registry.online_among(&[UserId::new(3), UserId::new(2), UserId::new(1)]);
        assert_eq!(online, vec![UserId::new(3), UserId::new(1)]);
    }
}
