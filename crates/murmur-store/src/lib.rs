//! `RocksDB` storage layer for murmur.
//!
//! This crate provides persistent storage for users, conversations, messages,
//! delivery statuses, blocks, and notifications using `RocksDB` with column
//! families for efficient indexing.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `users`, `conversations`, `messages`, `notifications`: primary records
//! - `participants` / `conversations_by_user`: membership in both directions
//! - `messages_by_conversation`: history index, scanned newest-first
//! - `message_status` / `status_by_receiver`: per-recipient delivery rows
//! - `blocked_users`: directed block pairs
//! - `sequences`: monotonic ID counters
//!
//! # Example
//!
//! ```no_run
//! use murmur_store::{RocksStore, Store};
//!
//! let store = RocksStore::open("/tmp/murmur-db").unwrap();
//!
//! let alice = store.create_user("alice", None, None).unwrap();
//! let bob = store.create_user("bob", None, None).unwrap();
//! let chat = store
//!     .create_conversation(false, None, &[alice.user_id, bob.user_id])
//!     .unwrap();
//! assert!(store.is_participant(chat.conversation_id, bob.user_id).unwrap());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;
pub mod types;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;
pub use types::{
    BlockedPair, Conversation, DeliveryStatus, Message, MessageStatus, NewNotification,
    Notification, NotificationKind, Participant, ReferenceType, User, UserStatus,
};

use murmur_core::{ConversationId, MessageId, NotificationId, UserId};

/// Maximum length of a notification body, in characters.
pub const MAX_NOTIFICATION_CHARS: usize = 1000;

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (e.g., `RocksDB`, in-memory for testing). Operations that read and then
/// write the same row are atomic with respect to each other.
pub trait Store: Send + Sync {
    // =========================================================================
    // User Operations
    // =========================================================================

    /// Create a user with a freshly allocated ID and `offline` status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn create_user(
        &self,
        username: &str,
        full_name: Option<String>,
        avatar_url: Option<String>,
    ) -> Result<User>;

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_user(&self, user_id: UserId) -> Result<Option<User>>;

    /// Persist a user's presence status.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user doesn't exist.
    fn update_user_status(&self, user_id: UserId, status: UserStatus) -> Result<()>;

    // =========================================================================
    // Conversation Operations
    // =========================================================================

    /// Create a conversation and add the given members in one batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn create_conversation(
        &self,
        is_group: bool,
        conversation_name: Option<String>,
        members: &[UserId],
    ) -> Result<Conversation>;

    /// Get a conversation by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_conversation(&self, conversation_id: ConversationId) -> Result<Option<Conversation>>;

    /// Add a member to a conversation. Adding an existing member is a no-op
    /// that returns the original membership row.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the conversation doesn't exist.
    fn add_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> Result<Participant>;

    /// Remove a member from a conversation.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user is not a member.
    fn remove_participant(&self, conversation_id: ConversationId, user_id: UserId) -> Result<()>;

    /// Check whether a user is a member of a conversation.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn is_participant(&self, conversation_id: ConversationId, user_id: UserId) -> Result<bool>;

    /// List the members of a conversation.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_participants(&self, conversation_id: ConversationId) -> Result<Vec<Participant>>;

    /// List the conversations a user belongs to.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_user_conversations(&self, user_id: UserId) -> Result<Vec<ConversationId>>;

    // =========================================================================
    // Message Operations
    // =========================================================================

    /// Persist a message with a freshly allocated, monotonically increasing ID.
    ///
    /// Content validation is the caller's responsibility.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the conversation doesn't exist.
    fn create_message(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        content: &str,
    ) -> Result<Message>;

    /// Get a message by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_message(&self, message_id: MessageId) -> Result<Option<Message>>;

    /// List up to `limit` messages of a conversation, newest first, strictly
    /// older than `before` when given.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_messages(
        &self,
        conversation_id: ConversationId,
        before: Option<MessageId>,
        limit: usize,
    ) -> Result<Vec<Message>>;

    // =========================================================================
    // Delivery Status Operations
    // =========================================================================

    /// Create the `sent` status rows for every recipient of a message.
    ///
    /// All rows and their receiver index entries land in one write; either
    /// every row is created or none is.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` if any of the rows already exists,
    /// or `StoreError::NotFound` if the message doesn't exist.
    fn create_message_statuses(
        &self,
        message_id: MessageId,
        receiver_ids: &[UserId],
    ) -> Result<Vec<MessageStatus>>;

    /// Get the status row for one recipient of a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_message_status(
        &self,
        message_id: MessageId,
        receiver_id: UserId,
    ) -> Result<Option<MessageStatus>>;

    /// List every status row of a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_message_statuses(&self, message_id: MessageId) -> Result<Vec<MessageStatus>>;

    /// Move a status row forward to `target`.
    ///
    /// Returns the updated row, or `None` when the row is already at or past
    /// `target`. Statuses never move backwards.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the row doesn't exist.
    fn advance_message_status(
        &self,
        message_id: MessageId,
        receiver_id: UserId,
        target: DeliveryStatus,
    ) -> Result<Option<MessageStatus>>;

    /// Mark every unread status row of `receiver_id` in a conversation as
    /// read. Returns the number of rows changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn mark_conversation_read(
        &self,
        conversation_id: ConversationId,
        receiver_id: UserId,
    ) -> Result<u32>;

    // =========================================================================
    // Block Operations
    // =========================================================================

    /// Record that `blocker_id` blocks `blocked_id`. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidInput` if a user tries to block themselves.
    fn block_user(&self, blocker_id: UserId, blocked_id: UserId) -> Result<BlockedPair>;

    /// Remove a block.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no such block exists.
    fn unblock_user(&self, blocker_id: UserId, blocked_id: UserId) -> Result<()>;

    /// Check whether `blocker_id` blocks `blocked_id`. Direction matters.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn is_blocked(&self, blocker_id: UserId, blocked_id: UserId) -> Result<bool>;

    // =========================================================================
    // Notification Operations
    // =========================================================================

    /// Persist an unseen notification.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidInput` if the content is empty or longer
    /// than [`MAX_NOTIFICATION_CHARS`].
    fn create_notification(&self, notification: &NewNotification) -> Result<Notification>;

    /// List a user's notifications, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_notifications(&self, user_id: UserId) -> Result<Vec<Notification>>;

    /// Count a user's unseen notifications.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn count_unseen_notifications(&self, user_id: UserId) -> Result<u32>;

    /// Mark one of a user's notifications as seen and return it.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the notification doesn't exist or
    /// belongs to someone else.
    fn mark_notification_seen(
        &self,
        user_id: UserId,
        notification_id: NotificationId,
    ) -> Result<Notification>;

    /// Mark every unseen notification of a user as seen. Returns the number
    /// of notifications changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn mark_all_notifications_seen(&self, user_id: UserId) -> Result<u32>;
}
