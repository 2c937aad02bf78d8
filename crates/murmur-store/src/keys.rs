//! Key encoding utilities for `RocksDB`.
//!
//! Composite keys are concatenations of 8-byte big-endian IDs. A key's
//! leading segments double as the prefix for scanning its index.

use murmur_core::{ConversationId, IdError, MessageId, NotificationId, UserId};

/// Width of a single ID segment.
pub const SEGMENT: usize = 8;

fn compose<const N: usize>(segments: [[u8; SEGMENT]; N]) -> Vec<u8> {
    let mut key = Vec::with_capacity(N * SEGMENT);
    for segment in segments {
        key.extend_from_slice(&segment);
    }
    key
}

/// Encode a user key.
#[must_use]
pub fn user_key(user_id: UserId) -> Vec<u8> {
    user_id.to_be_bytes().to_vec()
}

/// Encode a conversation key.
#[must_use]
pub fn conversation_key(conversation_id: ConversationId) -> Vec<u8> {
    conversation_id.to_be_bytes().to_vec()
}

/// Encode a participant key: `conversation_id || user_id`.
#[must_use]
pub fn participant_key(conversation_id: ConversationId, user_id: UserId) -> Vec<u8> {
    compose([conversation_id.to_be_bytes(), user_id.to_be_bytes()])
}

/// Encode a conversation prefix for scanning participants or messages.
#[must_use]
pub fn conversation_prefix(conversation_id: ConversationId) -> Vec<u8> {
    conversation_id.to_be_bytes().to_vec()
}

/// Encode a user-conversation index key: `user_id || conversation_id`.
#[must_use]
pub fn user_conversation_key(user_id: UserId, conversation_id: ConversationId) -> Vec<u8> {
    compose([user_id.to_be_bytes(), conversation_id.to_be_bytes()])
}

/// Encode a user prefix for scanning conversations or notifications by user.
#[must_use]
pub fn user_prefix(user_id: UserId) -> Vec<u8> {
    user_id.to_be_bytes().to_vec()
}

/// Encode a message key.
#[must_use]
pub fn message_key(message_id: MessageId) -> Vec<u8> {
    message_id.to_be_bytes().to_vec()
}

/// Encode a conversation-message index key: `conversation_id || message_id`.
#[must_use]
pub fn conversation_message_key(conversation_id: ConversationId, message_id: MessageId) -> Vec<u8> {
    compose([conversation_id.to_be_bytes(), message_id.to_be_bytes()])
}

/// Encode a status key: `message_id || receiver_id`.
#[must_use]
pub fn status_key(message_id: MessageId, receiver_id: UserId) -> Vec<u8> {
    compose([message_id.to_be_bytes(), receiver_id.to_be_bytes()])
}

/// Encode a message prefix for scanning all status rows of a message.
#[must_use]
pub fn message_prefix(message_id: MessageId) -> Vec<u8> {
    message_id.to_be_bytes().to_vec()
}

/// Encode a receiver status index key:
/// `receiver_id || conversation_id || message_id`.
#[must_use]
pub fn receiver_status_key(
    receiver_id: UserId,
    conversation_id: ConversationId,
    message_id: MessageId,
) -> Vec<u8> {
    compose([
        receiver_id.to_be_bytes(),
        conversation_id.to_be_bytes(),
        message_id.to_be_bytes(),
    ])
}

/// Encode a prefix for scanning a receiver's status rows in one conversation.
#[must_use]
pub fn receiver_conversation_prefix(
    receiver_id: UserId,
    conversation_id: ConversationId,
) -> Vec<u8> {
    compose([receiver_id.to_be_bytes(), conversation_id.to_be_bytes()])
}

/// Encode a block key: `blocker_id || blocked_id`.
#[must_use]
pub fn block_key(blocker_id: UserId, blocked_id: UserId) -> Vec<u8> {
    compose([blocker_id.to_be_bytes(), blocked_id.to_be_bytes()])
}

/// Encode a notification key.
#[must_use]
pub fn notification_key(notification_id: NotificationId) -> Vec<u8> {
    notification_id.to_be_bytes().to_vec()
}

/// Encode a user-notification index key: `user_id || notification_id`.
#[must_use]
pub fn user_notification_key(user_id: UserId, notification_id: NotificationId) -> Vec<u8> {
    compose([user_id.to_be_bytes(), notification_id.to_be_bytes()])
}

/// Extract the segment at `index` from a composite key.
///
/// # Errors
///
/// Returns an error if the key is too short to hold that segment.
pub fn segment<T>(key: &[u8], index: usize) -> Result<T, IdError>
where
    T: From<u64>,
{
    let start = index * SEGMENT;
    let bytes = key.get(start..).unwrap_or_default();
    let arr: [u8; SEGMENT] = bytes
        .get(..SEGMENT)
        .and_then(|b| b.try_into().ok())
        .ok_or(IdError::InvalidLength {
            expected: start + SEGMENT,
            got: key.len(),
        })?;
    Ok(T::from(u64::from_be_bytes(arr)))
}
