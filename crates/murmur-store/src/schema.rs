//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.
//! Every ID segment in a key is a big-endian `u64`, so prefix scans return
//! rows in allocation order.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// User records, keyed by `user_id`.
    pub const USERS: &str = "users";

    /// Conversation records, keyed by `conversation_id`.
    pub const CONVERSATIONS: &str = "conversations";

    /// Participant records, keyed by `conversation_id || user_id`.
    pub const PARTICIPANTS: &str = "participants";

    /// Index: conversations by member, keyed by `user_id || conversation_id`.
    pub const CONVERSATIONS_BY_USER: &str = "conversations_by_user";

    /// Message records, keyed by `message_id`.
    pub const MESSAGES: &str = "messages";

    /// Index: messages by conversation, keyed by `conversation_id || message_id`.
    pub const MESSAGES_BY_CONVERSATION: &str = "messages_by_conversation";

    /// Delivery status rows, keyed by `message_id || receiver_id`.
    pub const MESSAGE_STATUS: &str = "message_status";

    /// Index: status rows by recipient, keyed by
    /// `receiver_id || conversation_id || message_id`.
    pub const STATUS_BY_RECEIVER: &str = "status_by_receiver";

    /// Block records, keyed by `blocker_id || blocked_id`.
    pub const BLOCKED_USERS: &str = "blocked_users";

    /// Notification records, keyed by `notification_id`.
    pub const NOTIFICATIONS: &str = "notifications";

    /// Index: notifications by recipient, keyed by `user_id || notification_id`.
    pub const NOTIFICATIONS_BY_USER: &str = "notifications_by_user";

    /// Monotonic ID counters, keyed by sequence name.
    pub const SEQUENCES: &str = "sequences";
}

/// Sequence names used for ID allocation.
pub mod seq {
    /// Next `UserId`.
    pub const USER: &[u8] = b"user";
    /// Next `ConversationId`.
    pub const CONVERSATION: &[u8] = b"conversation";
    /// Next `MessageId`.
    pub const MESSAGE: &[u8] = b"message";
    /// Next `NotificationId`.
    pub const NOTIFICATION: &[u8] = b"notification";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::USERS,
        cf::CONVERSATIONS,
        cf::PARTICIPANTS,
        cf::CONVERSATIONS_BY_USER,
        cf::MESSAGES,
        cf::MESSAGES_BY_CONVERSATION,
        cf::MESSAGE_STATUS,
        cf::STATUS_BY_RECEIVER,
        cf::BLOCKED_USERS,
        cf::NOTIFICATIONS,
        cf::NOTIFICATIONS_BY_USER,
        cf::SEQUENCES,
    ]
}
