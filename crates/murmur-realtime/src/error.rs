//! Error types for the messaging core.
//!
//! Every variant is terminal for the command that raised it; none of them
//! close the connection the command arrived on.

use std::borrow::Cow;

use murmur_core::{ConversationId, MessageId, NotificationId, UserId};
use murmur_store::StoreError;
use thiserror::Error;

/// A result type using `ChatError`.
pub type Result<T> = std::result::Result<T, ChatError>;

/// Text sent to clients when a send is vetoed by a block.
pub const BLOCKED_MESSAGE: &str = "Cannot send message - you are blocked";

/// Category of a [`ChatError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller may not act on the target.
    Forbidden,
    /// The target does not exist, or is not visible to the caller.
    NotFound,
    /// The request itself is malformed.
    InvalidArgument,
    /// Storage failed; retrying may help.
    Transient,
}

/// Errors that can occur in messaging operations.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The user is not a participant of the conversation.
    #[error("access denied to conversation {0}")]
    AccessDenied(ConversationId),

    /// The conversation does not exist.
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// The message does not exist.
    #[error("message not found: {0}")]
    MessageNotFound(MessageId),

    /// No delivery status row exists for this recipient of the message.
    #[error("no status for message {message_id} and receiver {receiver_id}")]
    StatusNotFound {
        /// The message.
        message_id: MessageId,
        /// The recipient.
        receiver_id: UserId,
    },

    /// The notification does not exist or belongs to another user.
    #[error("notification not found: {0}")]
    NotificationNotFound(NotificationId),

    /// The user does not exist.
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    /// The user is not a member of the conversation being changed.
    #[error("user {user_id} is not a participant of conversation {conversation_id}")]
    NotParticipant {
        /// The conversation.
        conversation_id: ConversationId,
        /// The user.
        user_id: UserId,
    },

    /// The request payload is malformed or out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The action is vetoed by a block between the users involved.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Storage layer error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl ChatError {
    /// Short machine-readable category. Transport layers map these onto
    /// their own status codes.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::AccessDenied(_) | Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::ConversationNotFound(_)
            | Self::MessageNotFound(_)
            | Self::StatusNotFound { .. }
            | Self::NotificationNotFound(_)
            | Self::UserNotFound(_)
            | Self::NotParticipant { .. } => ErrorKind::NotFound,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Store(_) => ErrorKind::Transient,
        }
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient)
    }

    /// Text safe to show to the client that issued the command.
    ///
    /// Storage failures are not described; callers substitute their own
    /// command-specific text for those.
    #[must_use]
    pub fn client_message(&self) -> Cow<'static, str> {
        match self {
            Self::AccessDenied(_) => Cow::Borrowed("Access denied to this conversation"),
            Self::ConversationNotFound(_) => Cow::Borrowed("Conversation not found"),
            Self::MessageNotFound(_) => Cow::Borrowed("Message not found"),
            Self::StatusNotFound { .. } => Cow::Borrowed("Message status not found"),
            Self::NotificationNotFound(_) => Cow::Borrowed("Notification not found"),
            Self::UserNotFound(_) => Cow::Borrowed("User not found"),
            Self::NotParticipant { .. } => Cow::Borrowed("User is not a participant"),
            Self::InvalidArgument(msg) | Self::Forbidden(msg) => Cow::Owned(msg.clone()),
            Self::Store(_) => Cow::Borrowed("Internal server error"),
        }
    }
}
