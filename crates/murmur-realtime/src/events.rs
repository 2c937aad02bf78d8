//! Wire events exchanged over a live connection.
//!
//! Every frame is a JSON object `{"event": "<name>", "data": {...}}`.

use murmur_core::{ConversationId, MessageId, UserId};
use murmur_store::{DeliveryStatus, Notification, UserStatus};
use serde::{Deserialize, Serialize};

use crate::types::{MessageView, OnlineUser};

/// Text sent back when a frame cannot be decoded.
pub const INVALID_FRAME_MESSAGE: &str = "Invalid message data";

/// Commands a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Post a message to a conversation.
    SendMessage {
        /// Target conversation.
        conversation_id: ConversationId,
        /// Message body.
        content: String,
    },
    /// Signal that the user started typing.
    TypingStart {
        /// Conversation being typed in.
        conversation_id: ConversationId,
    },
    /// Signal that the user stopped typing.
    TypingStop {
        /// Conversation being typed in.
        conversation_id: ConversationId,
    },
    /// Mark a received message as read.
    MessageRead {
        /// The message.
        message_id: MessageId,
    },
    /// Subscribe this connection to a conversation.
    JoinConversation {
        /// The conversation.
        conversation_id: ConversationId,
    },
    /// Unsubscribe this connection from a conversation.
    LeaveConversation {
        /// The conversation.
        conversation_id: ConversationId,
    },
    /// Change the user's presence status.
    UpdateStatus {
        /// One of `online`, `offline`, `busy`.
        status: String,
    },
    /// List members of a conversation that are currently connected.
    GetOnlineUsers {
        /// The conversation.
        conversation_id: ConversationId,
    },
}

impl ClientCommand {
    /// Event name, for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SendMessage { .. } => "send_message",
            Self::TypingStart { .. } => "typing_start",
            Self::TypingStop { .. } => "typing_stop",
            Self::MessageRead { .. } => "message_read",
            Self::JoinConversation { .. } => "join_conversation",
            Self::LeaveConversation { .. } => "leave_conversation",
            Self::UpdateStatus { .. } => "update_status",
            Self::GetOnlineUsers { .. } => "get_online_users",
        }
    }

    /// Text reported when the command fails on a storage error.
    #[must_use]
    pub const fn failure_message(&self) -> &'static str {
        match self {
            Self::SendMessage { .. } => "Failed to send message",
            Self::MessageRead { .. } => "Failed to update message status",
            Self::JoinConversation { .. } | Self::LeaveConversation { .. } => {
                "Failed to update subscription"
            }
            Self::UpdateStatus { .. } => "Failed to update status",
            Self::GetOnlineUsers { .. } => "Failed to get online users",
            Self::TypingStart { .. } | Self::TypingStop { .. } => "Failed to relay typing",
        }
    }
}

/// Events pushed to a client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A message was posted to a subscribed conversation.
    NewMessage {
        /// The message with author and statuses.
        message: MessageView,
        /// Conversation it was posted to.
        conversation_id: ConversationId,
    },
    /// A member started typing.
    UserTyping {
        /// Who is typing.
        user_id: UserId,
        /// Their handle.
        username: String,
        /// Where.
        conversation_id: ConversationId,
    },
    /// A member stopped typing.
    UserStoppedTyping {
        /// Who stopped.
        user_id: UserId,
        /// Where.
        conversation_id: ConversationId,
    },
    /// A recipient's delivery state of one of your messages advanced.
    MessageStatusUpdated {
        /// The message.
        message_id: MessageId,
        /// The recipient whose state changed.
        reader_id: UserId,
        /// Their new state.
        status: DeliveryStatus,
        /// Conversation of the message.
        conversation_id: ConversationId,
    },
    /// Someone you share a conversation with changed presence.
    UserStatusChanged {
        /// The user.
        user_id: UserId,
        /// Their new status.
        status: UserStatus,
    },
    /// Acknowledges your own `update_status`.
    StatusUpdated {
        /// The status now persisted.
        status: UserStatus,
    },
    /// Reply to `get_online_users`.
    OnlineUsers {
        /// The conversation asked about.
        conversation_id: ConversationId,
        /// Connected members.
        online_users: Vec<OnlineUser>,
    },
    /// Acknowledges `join_conversation`.
    JoinedConversation {
        /// The conversation joined.
        conversation_id: ConversationId,
    },
    /// Acknowledges `leave_conversation`.
    LeftConversation {
        /// The conversation left.
        conversation_id: ConversationId,
    },
    /// Current number of unseen notifications.
    UnreadNotificationsCount {
        /// The count.
        count: u32,
    },
    /// A notification was created for you.
    NewNotification {
        /// The notification.
        notification: Notification,
    },
    /// A command failed.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

impl ServerEvent {
    /// Build an `error` event.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Event name, for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NewMessage { .. } => "new_message",
            Self::UserTyping { .. } => "user_typing",
            Self::UserStoppedTyping { .. } => "user_stopped_typing",
            Self::MessageStatusUpdated { .. } => "message_status_updated",
            Self::UserStatusChanged { .. } => "user_status_changed",
            Self::StatusUpdated { .. } => "status_updated",
            Self::OnlineUsers { .. } => "online_users",
            Self::JoinedConversation { .. } => "joined_conversation",
            Self::LeftConversation { .. } => "left_conversation",
            Self::UnreadNotificationsCount { .. } => "unread_notifications_count",
            Self::NewNotification { .. } => "new_notification",
            Self::Error { .. } => "error",
        }
    }
}
