//! Delivery status reconciliation.
//!
//! Moves (message, recipient) rows forward and tells the message's sender
//! when one of their recipients advances.

use murmur_core::{ConversationId, MessageId, UserId};
use murmur_store::{DeliveryStatus, Store, StoreError};

use crate::dispatch::ensure_participant;
use crate::error::{ChatError, Result};
use crate::events::ServerEvent;
use crate::lifecycle;
use crate::registry::ConnectionRegistry;
use crate::types::StatusChange;

/// Advance one recipient's status for a message to `target`.
///
/// Moving to the current state or behind it succeeds without writing or
/// emitting anything. A forward move is persisted and, if the sender is
/// connected, reported to them as `message_status_updated`.
///
/// # Errors
///
/// Returns `ChatError::StatusNotFound` if the recipient has no row for the
/// message, or a storage error.
pub fn advance_status<S: Store>(
    store: &S,
    registry: &ConnectionRegistry,
    message_id: MessageId,
    receiver_id: UserId,
    target: DeliveryStatus,
) -> Result<StatusChange> {
    let not_found = || ChatError::StatusNotFound {
        message_id,
        receiver_id,
    };

    let current = store
        .get_message_status(message_id, receiver_id)?
        .ok_or_else(not_found)?;

    let unchanged = StatusChange {
        message_id,
        receiver_id,
        conversation_id: current.conversation_id,
        status: current.status,
        changed: false,
        sender_notified: false,
    };

    if !lifecycle::is_forward_transition(current.status, target) {
        return Ok(unchanged);
    }

    // The store re-checks under its own lock; a concurrent writer may have
    // got there first.
    let updated = match store.advance_message_status(message_id, receiver_id, target) {
        Ok(Some(row)) => row,
        Ok(None) => {
            let status = store
                .get_message_status(message_id, receiver_id)?
                .map_or(target, |row| row.status);
            return Ok(StatusChange { status, ..unchanged });
        }
        Err(StoreError::NotFound) => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };

    tracing::debug!(
        message_id = %message_id,
        receiver_id = %receiver_id,
        from = %current.status,
        to = %updated.status,
        "Advanced message status"
    );

    let message = store
        .get_message(message_id)?
        .ok_or(ChatError::MessageNotFound(message_id))?;

    let sender_notified = registry.send_to_user(
        message.sender_id,
        ServerEvent::MessageStatusUpdated {
            message_id,
            reader_id: receiver_id,
            status: updated.status,
            conversation_id: updated.conversation_id,
        },
    );

    Ok(StatusChange {
        status: updated.status,
        changed: true,
        sender_notified,
        ..unchanged
    })
}

/// Mark a message as read by `receiver_id`.
///
/// # Errors
///
/// See [`advance_status`].
pub fn mark_read<S: Store>(
    store: &S,
    registry: &ConnectionRegistry,
    message_id: MessageId,
    receiver_id: UserId,
) -> Result<StatusChange> {
    advance_status(store, registry, message_id, receiver_id, DeliveryStatus::Read)
}

/// Mark every message `receiver_id` has not read in a conversation as read.
///
/// Emits no per-message events. Returns the number of rows changed.
///
/// # Errors
///
/// Returns `ChatError::AccessDenied` if the receiver is not a participant,
/// or a storage error.
pub fn mark_all_read<S: Store>(
    store: &S,
    conversation_id: ConversationId,
    receiver_id: UserId,
) -> Result<u32> {
    ensure_participant(store, conversation_id, receiver_id)?;

    let updated = store.mark_conversation_read(conversation_id, receiver_id)?;

    tracing::debug!(
        conversation_id = %conversation_id,
        receiver_id = %receiver_id,
        updated,
        "Marked conversation read"
    );

    Ok(updated)
}
