//! Notification creation and live push.

use murmur_core::{MessageId, NotificationId, UserId};
use murmur_store::{
    Conversation, NewNotification, Notification, NotificationKind, ReferenceType, Store,
    StoreError, MAX_NOTIFICATION_CHARS,
};

use crate::error::{ChatError, Result};
use crate::events::ServerEvent;
use crate::registry::ConnectionRegistry;
use crate::types::{ChatConfig, NotificationPage, NotificationQuery};

/// Text of the notification left for an offline recipient of a message.
#[must_use]
pub fn message_notification_content(conversation: &Conversation, sender_username: &str) -> String {
    let text = if conversation.is_group {
        let name = conversation
            .conversation_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or("group chat");
        format!("New message in {name} from {sender_username}")
    } else {
        format!("New message from {sender_username}")
    };
    truncate_chars(text, MAX_NOTIFICATION_CHARS)
}

fn truncate_chars(mut text: String, max: usize) -> String {
    if let Some((index, _)) = text.char_indices().nth(max) {
        text.truncate(index);
    }
    text
}

/// Build the `new_message` notification for one offline recipient.
#[must_use]
pub fn new_message_notification(
    recipient: UserId,
    sender: UserId,
    message_id: MessageId,
    content: String,
) -> NewNotification {
    NewNotification {
        user_id: recipient,
        actor_id: Some(sender),
        kind: NotificationKind::NewMessage,
        content,
        reference_type: Some(ReferenceType::Message),
        reference_id: Some(message_id.get()),
    }
}

/// Persist a notification and, if its recipient is connected, push it along
/// with their refreshed unseen count.
///
/// # Errors
///
/// Returns an error if the notification cannot be stored. Failures while
/// counting for the live push are logged and do not fail the call.
pub fn create_and_send<S: Store>(
    store: &S,
    registry: &ConnectionRegistry,
    notification: &NewNotification,
) -> Result<Notification> {
    let created = store.create_notification(notification)?;
    let user_id = created.user_id;

    tracing::debug!(
        notification_id = %created.notification_id,
        user_id = %user_id,
        kind = ?created.kind,
        "Created notification"
    );

    if registry.is_online(user_id) {
        registry.send_to_user(
            user_id,
            ServerEvent::NewNotification {
                notification: created.clone(),
            },
        );
        push_unread_count(store, registry, user_id);
    }

    Ok(created)
}

/// Send the user's current unseen notification count to their connection,
/// if they have one. A failed count is logged and nothing is sent.
pub fn push_unread_count<S: Store>(store: &S, registry: &ConnectionRegistry, user_id: UserId) {
    if !registry.is_online(user_id) {
        return;
    }
    match store.count_unseen_notifications(user_id) {
        Ok(count) => {
            registry.send_to_user(user_id, ServerEvent::UnreadNotificationsCount { count });
        }
        Err(e) => tracing::warn!(user_id = %user_id, error = %e, "Failed to push unread count"),
    }
}

/// One page of a user's notifications, newest first, optionally filtered by
/// seen state.
///
/// # Errors
///
/// Returns a storage error if the notifications cannot be read.
pub fn list_page<S: Store>(
    store: &S,
    config: &ChatConfig,
    user_id: UserId,
    query: NotificationQuery,
) -> Result<NotificationPage> {
    let per_page = query
        .limit
        .unwrap_or(config.default_notification_limit)
        .clamp(1, config.max_notification_limit.max(1));
    let current_page = query.page.unwrap_or(1).max(1);

    let mut matching: Vec<Notification> = store
        .list_notifications(user_id)?
        .into_iter()
        .filter(|n| match query.is_seen {
            Some(seen) => n.is_seen == seen,
            None => true,
        })
        .collect();
    matching.reverse();

    let total_count = matching.len();
    let notifications = matching
        .into_iter()
        .skip((current_page - 1).saturating_mul(per_page))
        .take(per_page)
        .collect();

    Ok(NotificationPage {
        notifications,
        current_page,
        per_page,
        total_count,
        total_pages: total_count.div_ceil(per_page),
    })
}

/// Mark one of the user's notifications as seen and push their refreshed
/// unseen count.
///
/// # Errors
///
/// Returns `ChatError::NotificationNotFound` if the notification doesn't
/// exist or isn't theirs, or a storage error.
pub fn mark_seen<S: Store>(
    store: &S,
    registry: &ConnectionRegistry,
    user_id: UserId,
    notification_id: NotificationId,
) -> Result<Notification> {
    let notification = store
        .mark_notification_seen(user_id, notification_id)
        .map_err(|e| match e {
            StoreError::NotFound => ChatError::NotificationNotFound(notification_id),
            other => ChatError::Store(other),
        })?;

    tracing::debug!(
        notification_id = %notification_id,
        user_id = %user_id,
        "Marked notification seen"
    );
    push_unread_count(store, registry, user_id);
    Ok(notification)
}

/// Mark every unseen notification of the user as seen and push their
/// refreshed unseen count. Returns the number changed.
///
/// # Errors
///
/// Returns a storage error if the update fails.
pub fn mark_all_seen<S: Store>(
    store: &S,
    registry: &ConnectionRegistry,
    user_id: UserId,
) -> Result<u32> {
    let updated = store.mark_all_notifications_seen(user_id)?;
    tracing::debug!(user_id = %user_id, updated, "Marked all notifications seen");
    push_unread_count(store, registry, user_id);
    Ok(updated)
}
