//! Live subscription groups, one per conversation.
//!
//! Rooms are a cache of which connections should see a conversation's
//! traffic. They are filled from durable membership at connect time and
//! changed by join, leave, disconnect and participant removal; broadcasts
//! never go back to the store.

use std::collections::{HashMap, HashSet};

use murmur_core::{ConnectionId, ConversationId, UserId};
use parking_lot::RwLock;

use crate::connection::ConnectionHandle;
use crate::events::ServerEvent;

#[derive(Debug, Default)]
struct RoomState {
    /// Conversation -> subscribed connections.
    rooms: HashMap<ConversationId, HashMap<ConnectionId, ConnectionHandle>>,
    /// Connection -> conversations it is subscribed to.
    memberships: HashMap<ConnectionId, HashSet<ConversationId>>,
}

impl RoomState {
    fn remove(&mut self, connection_id: ConnectionId, conversation_id: ConversationId) -> bool {
        let removed = match self.rooms.get_mut(&conversation_id) {
            Some(room) => {
                let removed = room.remove(&connection_id).is_some();
                if room.is_empty() {
                    self.rooms.remove(&conversation_id);
                }
                removed
            }
            None => false,
        };

        if let Some(joined) = self.memberships.get_mut(&connection_id) {
            joined.remove(&conversation_id);
            if joined.is_empty() {
                self.memberships.remove(&connection_id);
            }
        }
        removed
    }
}

/// Manager of all rooms in the process.
#[derive(Debug, Default)]
pub struct RoomManager {
    state: RwLock<RoomState>,
}

impl RoomManager {
    /// Create an empty room manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a connection to a conversation.
    ///
    /// Membership must already have been checked. Returns `true` if the
    /// connection was not subscribed before.
    pub fn subscribe(&self, handle: &ConnectionHandle, conversation_id: ConversationId) -> bool {
        let mut state = self.state.write();
        state
            .memberships
            .entry(handle.id())
            .or_default()
            .insert(conversation_id);
        state
            .rooms
            .entry(conversation_id)
            .or_default()
            .insert(handle.id(), handle.clone())
            .is_none()
    }

    /// Subscribe a connection to several conversations under one lock.
    pub fn subscribe_all(&self, handle: &ConnectionHandle, conversation_ids: &[ConversationId]) {
        let mut state = self.state.write();
        for &conversation_id in conversation_ids {
            state
                .memberships
                .entry(handle.id())
                .or_default()
                .insert(conversation_id);
            state
                .rooms
                .entry(conversation_id)
                .or_default()
                .insert(handle.id(), handle.clone());
        }
    }

    /// Unsubscribe a connection from a conversation.
    ///
    /// Returns `true` if it was subscribed.
    pub fn leave(&self, connection_id: ConnectionId, conversation_id: ConversationId) -> bool {
        self.state.write().remove(connection_id, conversation_id)
    }

    /// Queue `event` to every connection subscribed to the conversation,
    /// optionally skipping one connection.
    ///
    /// Delivery is best-effort; returns the number of connections the event
    /// was queued to.
    pub fn broadcast(
        &self,
        conversation_id: ConversationId,
        event: &ServerEvent,
        exclude: Option<ConnectionId>,
    ) -> usize {
        let state = self.state.read();
        let Some(room) = state.rooms.get(&conversation_id) else {
            return 0;
        };

        let mut delivered = 0;
        for (connection_id, handle) in room {
            if Some(*connection_id) == exclude {
                continue;
            }
            if handle.send(event.clone()) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Remove every subscription of a closed connection.
    ///
    /// Returns the number of rooms it was removed from.
    pub fn drop_connection(&self, connection_id: ConnectionId) -> usize {
        let mut state = self.state.write();
        let Some(joined) = state.memberships.remove(&connection_id) else {
            return 0;
        };

        for conversation_id in &joined {
            if let Some(room) = state.rooms.get_mut(conversation_id) {
                room.remove(&connection_id);
                if room.is_empty() {
                    state.rooms.remove(conversation_id);
                }
            }
        }
        joined.len()
    }

    /// Unsubscribe every connection of `user_id` from a conversation, after
    /// the user stopped being a participant.
    ///
    /// Returns the number of connections removed.
    pub fn evict_user(&self, conversation_id: ConversationId, user_id: UserId) -> usize {
        let mut state = self.state.write();
        let targets: Vec<ConnectionId> = state
            .rooms
            .get(&conversation_id)
            .map(|room| {
                room.values()
                    .filter(|handle| handle.user_id() == user_id)
                    .map(ConnectionHandle::id)
                    .collect()
            })
            .unwrap_or_default();

        for &connection_id in &targets {
            state.remove(connection_id, conversation_id);
        }
        targets.len()
    }
}

#[cfg(test)]
impl RoomManager {
    pub(crate) fn is_subscribed(
        &self,
        connection_id: ConnectionId,
        conversation_id: ConversationId,
    ) -> bool {
        self.state
            .read()
            .memberships
            .get(&connection_id)
            .is_some_and(|joined| joined.contains(&conversation_id))
    }

    pub(crate) fn subscriber_count(&self, conversation_id: ConversationId) -> usize {
        self.state
            .read()
            .rooms
            .get(&conversation_id)
            .map_or(0, HashMap::len)
    }
}
