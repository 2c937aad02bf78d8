//! Message dispatch pipeline.
//!
//! A send runs these gates in order; the first failure ends it:
//!
//! 1. content is non-empty after trimming and within the length limit
//! 2. the sender is a participant
//! 3. the conversation exists
//! 4. no block exists between the sender and any other participant
//!
//! Only then is the message written, exactly as the client sent it, followed
//! by the `sent` status rows of all recipients in a single write, the room
//! fanout, and notifications for offline recipients. Nothing after the
//! message write can undo it.

use murmur_core::{ConversationId, UserId};
use murmur_store::{MessageStatus, Store, StoreError};

use crate::error::{ChatError, Result, BLOCKED_MESSAGE};
use crate::events::ServerEvent;
use crate::notify;
use crate::registry::ConnectionRegistry;
use crate::rooms::RoomManager;
use crate::types::{ChatConfig, MessageView, SendOutcome, SenderSummary};

/// Check `content` against the length limit. Surrounding whitespace does not
/// count, but is kept in what gets stored.
///
/// # Errors
///
/// Returns `ChatError::InvalidArgument` if the trimmed content is empty or
/// longer than `max_chars` characters.
pub fn validate_content(content: &str, max_chars: usize) -> Result<()> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ChatError::InvalidArgument(
            "Message content cannot be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > max_chars {
        return Err(ChatError::InvalidArgument(format!(
            "Message content cannot exceed {max_chars} characters"
        )));
    }
    Ok(())
}

/// Fail with `AccessDenied` unless `user_id` is a participant.
///
/// # Errors
///
/// Returns `ChatError::AccessDenied` for non-participants, or a storage error.
pub fn ensure_participant<S: Store>(
    store: &S,
    conversation_id: ConversationId,
    user_id: UserId,
) -> Result<()> {
    if store.is_participant(conversation_id, user_id)? {
        Ok(())
    } else {
        Err(ChatError::AccessDenied(conversation_id))
    }
}

/// Whether a block exists in either direction between two users.
fn blocked_either_way<S: Store>(store: &S, a: UserId, b: UserId) -> Result<bool> {
    Ok(store.is_blocked(a, b)? || store.is_blocked(b, a)?)
}

/// Run the full send pipeline.
///
/// # Errors
///
/// Returns `InvalidArgument`, `AccessDenied`, `ConversationNotFound`,
/// `UserNotFound` or `Forbidden` before anything is written, or a storage
/// error if the message itself cannot be written. Failures after the
/// message is written are logged and reported in the outcome instead.
pub fn send_message<S: Store>(
    store: &S,
    registry: &ConnectionRegistry,
    rooms: &RoomManager,
    config: &ChatConfig,
    sender_id: UserId,
    conversation_id: ConversationId,
    content: &str,
) -> Result<SendOutcome> {
    validate_content(content, config.max_content_chars)?;

    ensure_participant(store, conversation_id, sender_id)?;

    let conversation = store
        .get_conversation(conversation_id)?
        .ok_or(ChatError::ConversationNotFound(conversation_id))?;

    let sender = store
        .get_user(sender_id)?
        .ok_or(ChatError::UserNotFound(sender_id))?;

    let recipients: Vec<UserId> = store
        .list_participants(conversation_id)?
        .into_iter()
        .map(|p| p.user_id)
        .filter(|&id| id != sender_id)
        .collect();

    for &recipient in &recipients {
        if blocked_either_way(store, sender_id, recipient)? {
            tracing::info!(
                sender_id = %sender_id,
                conversation_id = %conversation_id,
                "Send vetoed by block"
            );
            return Err(ChatError::Forbidden(BLOCKED_MESSAGE.to_string()));
        }
    }

    let message = store
        .create_message(conversation_id, sender_id, content)
        .map_err(|e| match e {
            StoreError::NotFound => ChatError::ConversationNotFound(conversation_id),
            other => ChatError::Store(other),
        })?;

    tracing::info!(
        message_id = %message.message_id,
        conversation_id = %conversation_id,
        sender_id = %sender_id,
        recipients = recipients.len(),
        "Created message"
    );

    let (statuses, missing_statuses): (Vec<MessageStatus>, Vec<UserId>) =
        match store.create_message_statuses(message.message_id, &recipients) {
            Ok(rows) => (rows, Vec::new()),
            Err(e) => {
                tracing::error!(
                    message_id = %message.message_id,
                    recipients = recipients.len(),
                    error = %e,
                    "Failed to create message statuses"
                );
                (Vec::new(), recipients.clone())
            }
        };

    let message_id = message.message_id;
    let view = MessageView::new(message, SenderSummary::from(&sender), &statuses);
    let live_deliveries = rooms.broadcast(
        conversation_id,
        &ServerEvent::NewMessage {
            message: view.clone(),
            conversation_id,
        },
        None,
    );

    let mut notified_offline = Vec::new();
    let offline = recipients.iter().filter(|&&id| !registry.is_online(id));
    for &recipient in offline {
        let notification = notify::new_message_notification(
            recipient,
            sender_id,
            message_id,
            notify::message_notification_content(&conversation, &sender.username),
        );
        match notify::create_and_send(store, registry, &notification) {
            Ok(_) => notified_offline.push(recipient),
            Err(e) => tracing::warn!(
                message_id = %message_id,
                user_id = %recipient,
                error = %e,
                "Failed to create offline notification"
            ),
        }
    }

    Ok(SendOutcome {
        message: view,
        recipients,
        missing_statuses,
        notified_offline,
        live_deliveries,
    })
}
