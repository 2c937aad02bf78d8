//! Typing indicator relay.
//!
//! Fire-and-forget: nothing is persisted, nothing is acknowledged, and a
//! signal for a conversation the user is not in is silently dropped.

use murmur_core::ConversationId;
use murmur_store::Store;

use crate::connection::ConnectionHandle;
use crate::events::ServerEvent;
use crate::rooms::RoomManager;

/// Relay a typing start (`typing = true`) or stop to the conversation's
/// other subscribers.
///
/// Returns the number of connections the signal was queued to.
pub fn relay_typing<S: Store>(
    store: &S,
    rooms: &RoomManager,
    origin: &ConnectionHandle,
    username: &str,
    conversation_id: ConversationId,
    typing: bool,
) -> usize {
    let user_id = origin.user_id();
    match store.is_participant(conversation_id, user_id) {
        Ok(true) => {}
        Ok(false) => {
            tracing::debug!(
                user_id = %user_id,
                conversation_id = %conversation_id,
                "Dropping typing signal from non-participant"
            );
            return 0;
        }
        Err(e) => {
            tracing::warn!(
                user_id = %user_id,
                conversation_id = %conversation_id,
                error = %e,
                "Dropping typing signal after membership lookup failed"
            );
            return 0;
        }
    }

    let event = if typing {
        ServerEvent::UserTyping {
            user_id,
            username: username.to_string(),
            conversation_id,
        }
    } else {
        ServerEvent::UserStoppedTyping {
            user_id,
            conversation_id,
        }
    };

    rooms.broadcast(conversation_id, &event, Some(origin.id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_store::RocksStore;
    use tempfile::TempDir;

    #[test]
    fn typing_is_not_echoed_to_sender() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        let rooms = RoomManager::new();
        let a = store.create_user("a", None, None).unwrap().user_id;
        let b = store.create_user("b", None, None).unwrap().user_id;
        let chat = store
            .create_conversation(false, None, &[a, b])
            .unwrap()
            .conversation_id;

        let (ha, mut rx_a) = ConnectionHandle::channel(a, 8);
        let (hb, mut rx_b) = ConnectionHandle::channel(b, 8);
        rooms.subscribe(&ha, chat);
        rooms.subscribe(&hb, chat);

        assert_eq!(relay_typing(&store, &rooms, &ha, "a", chat, true), 1);
        assert!(rx_a.try_recv().is_err());
        assert!(matches!(
            rx_b.try_recv(),
            Ok(ServerEvent::UserTyping { username, .. }) if username == "a"
        ));

        assert_eq!(relay_typing(&store, &rooms, &ha, "a", chat, false), 1);
        assert!(matches!(
            rx_b.try_recv(),
            Ok(ServerEvent::UserStoppedTyping { user_id, .. }) if user_id == a
        ));
    }

    #[test]
    fn non_participant_signal_is_dropped() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        let rooms = RoomManager::new();
        let a = store.create_user("a", None, None).unwrap().user_id;
        let b = store.create_user("b", None, None).unwrap().user_id;
        let outsider = store.create_user("x", None, None).unwrap().user_id;
        let chat = store
            .create_conversation(false, None, &[a, b])
            .unwrap()
            .conversation_id;

        let (hb, mut rx_b) = ConnectionHandle::channel(b, 8);
        rooms.subscribe(&hb, chat);
        let (hx, _rx_x) = ConnectionHandle::channel(outsider, 8);

        assert_eq!(relay_typing(&store, &rooms, &hx, "x", chat, true), 0);
        assert!(rx_b.try_recv().is_err());
    }
}
