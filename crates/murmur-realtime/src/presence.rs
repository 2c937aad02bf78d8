//! Presence propagation.
//!
//! A user's presence changes are only visible to users who share at least
//! one conversation with them.

use std::collections::BTreeSet;

use murmur_core::{ConversationId, UserId};
use murmur_store::{Store, UserStatus};

use crate::dispatch::ensure_participant;
use crate::error::{ChatError, Result};
use crate::events::ServerEvent;
use crate::registry::ConnectionRegistry;
use crate::types::OnlineUser;

/// Everyone who shares at least one conversation with `user_id`, excluding
/// the user.
///
/// # Errors
///
/// Returns an error if membership cannot be read.
pub fn co_participants<S: Store>(store: &S, user_id: UserId) -> Result<BTreeSet<UserId>> {
    let mut peers = BTreeSet::new();
    for conversation_id in store.list_user_conversations(user_id)? {
        for participant in store.list_participants(conversation_id)? {
            if participant.user_id != user_id {
                peers.insert(participant.user_id);
            }
        }
    }
    Ok(peers)
}

/// Send `user_status_changed` to every connected co-participant.
///
/// Returns the number of users reached.
///
/// # Errors
///
/// Returns an error if membership cannot be read.
pub fn broadcast_status<S: Store>(
    store: &S,
    registry: &ConnectionRegistry,
    user_id: UserId,
    status: UserStatus,
) -> Result<usize> {
    let mut reached = 0;
    for peer in co_participants(store, user_id)? {
        if registry.send_to_user(peer, ServerEvent::UserStatusChanged { user_id, status }) {
            reached += 1;
        }
    }

    tracing::debug!(user_id = %user_id, status = %status, reached, "Broadcast presence");
    Ok(reached)
}

/// Parse a client-supplied presence status.
///
/// # Errors
///
/// Returns `ChatError::InvalidArgument` for anything other than `online`,
/// `offline` or `busy`.
pub fn parse_status(raw: &str) -> Result<UserStatus> {
    raw.parse()
        .map_err(|_| ChatError::InvalidArgument("Invalid status".to_string()))
}

/// Persist an explicit presence change and broadcast it.
///
/// The caller is responsible for acknowledging with `status_updated`.
///
/// # Errors
///
/// Returns `ChatError::InvalidArgument` for an unknown status, or a storage
/// error. A failed broadcast after the write is only logged.
pub fn update_status<S: Store>(
    store: &S,
    registry: &ConnectionRegistry,
    user_id: UserId,
    raw: &str,
) -> Result<UserStatus> {
    let status = parse_status(raw)?;
    store.update_user_status(user_id, status)?;

    if let Err(e) = broadcast_status(store, registry, user_id, status) {
        tracing::warn!(user_id = %user_id, error = %e, "Failed to broadcast status change");
    }
    Ok(status)
}

/// Connected participants of a conversation, for a requester who must be a
/// participant too.
///
/// # Errors
///
/// Returns `ChatError::AccessDenied` if the requester is not a participant,
/// or a storage error.
pub fn online_users<S: Store>(
    store: &S,
    registry: &ConnectionRegistry,
    requester: UserId,
    conversation_id: ConversationId,
) -> Result<Vec<OnlineUser>> {
    ensure_participant(store, conversation_id, requester)?;

    let members: Vec<UserId> = store
        .list_participants(conversation_id)?
        .into_iter()
        .map(|p| p.user_id)
        .collect();

    let mut online = Vec::new();
    for user_id in registry.online_among(&members) {
        if let Some(user) = store.get_user(user_id)? {
            online.push(OnlineUser {
                user_id,
                username: user.username,
                status: user.status,
            });
        }
    }
    Ok(online)
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_store::RocksStore;
    use tempfile::TempDir;

    use crate::connection::ConnectionHandle;

    #[test]
    fn co_participants_spans_all_conversations() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        let a = store.create_user("a", None, None).unwrap().user_id;
        let b = store.create_user("b", None, None).unwrap().user_id;
        let c = store.create_user("c", None, None).unwrap().user_id;
        let d = store.create_user("d", None, None).unwrap().user_id;
        store.create_conversation(false, None, &[a, b]).unwrap();
        store
            .create_conversation(true, Some("team".into()), &[a, b, c])
            .unwrap();
        store.create_conversation(false, None, &[c, d]).unwrap();

        let peers: Vec<_> = co_participants(&store, a).unwrap().into_iter().collect();
        assert_eq!(peers, vec![b, c]);
    }

    #[test]
    fn update_status_rejects_unknown_values() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        let registry = ConnectionRegistry::new();
        let a = store.create_user("a", None, None).unwrap().user_id;

        let result = update_status(&store, &registry, a, "away");
        assert!(matches!(result, Err(ChatError::InvalidArgument(m)) if m == "Invalid status"));
        assert_eq!(
            store.get_user(a).unwrap().unwrap().status,
            UserStatus::Offline
        );
    }

    #[test]
    fn update_status_reaches_only_co_participants() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        let registry = ConnectionRegistry::new();
        let a = store.create_user("a", None, None).unwrap().user_id;
        let b = store.create_user("b", None, None).unwrap().user_id;
        let stranger = store.create_user("s", None, None).unwrap().user_id;
        store.create_conversation(false, None, &[a, b]).unwrap();

        let (hb, mut rx_b) = ConnectionHandle::channel(b, 8);
        let (hs, mut rx_s) = ConnectionHandle::channel(stranger, 8);
        registry.register(hb);
        registry.register(hs);

        let status = update_status(&store, &registry, a, "busy").unwrap();
        assert_eq!(status, UserStatus::Busy);
        assert_eq!(store.get_user(a).unwrap().unwrap().status, UserStatus::Busy);

        assert!(matches!(
            rx_b.try_recv(),
            Ok(ServerEvent::UserStatusChanged { user_id, status: UserStatus::Busy }) if user_id == a
        ));
        assert!(rx_s.try_recv().is_err());
    }

    #[test]
    fn online_users_lists_connected_members() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        let registry = ConnectionRegistry::new();
        let a = store.create_user("a", None, None).unwrap().user_id;
        let b = store.create_user("b", None, None).unwrap().user_id;
        let c = store.create_user("c", None, None).unwrap().user_id;
        let chat = store
            .create_conversation(true, None, &[a, b, c])
            .unwrap()
            .conversation_id;

        let (hb, _rx_b) = ConnectionHandle::channel(b, 8);
        registry.register(hb);

        let online = online_users(&store, &registry, a, chat).unwrap();
        assert_eq!(online.len(), 1);
        assert_eq!(online[0].user_id, b);
        assert_eq!(online[0].username, "b");

        let outsider = store.create_user("x", None, None).unwrap().user_id;
        assert!(matches!(
            online_users(&store, &registry, outsider, chat),
            Err(ChatError::AccessDenied(_))
        ));
    }
}
