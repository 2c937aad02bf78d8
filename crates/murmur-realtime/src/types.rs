//! Request, response and configuration types for the messaging core.

use chrono::{DateTime, Utc};
use murmur_core::{ConversationId, MessageId, UserId};
use murmur_store::{DeliveryStatus, Message, MessageStatus, Notification, User, UserStatus};
use serde::{Deserialize, Serialize};

/// Configuration for the messaging core.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Maximum message length in characters, after trimming.
    pub max_content_chars: usize,
    /// Capacity of each connection's outbound event queue.
    pub outbound_queue_capacity: usize,
    /// History page size when the client does not ask for one.
    pub default_history_limit: usize,
    /// Largest history page a client may request.
    pub max_history_limit: usize,
    /// Notification page size when the client does not ask for one.
    pub default_notification_limit: usize,
    /// Largest notification page a client may request.
    pub max_notification_limit: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_content_chars: 5000,
            outbound_queue_capacity: 64,
            default_history_limit: 50,
            max_history_limit: 100,
            default_notification_limit: 20,
            max_notification_limit: 100,
        }
    }
}

/// Public profile of a message author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SenderSummary {
    /// The author.
    pub user_id: UserId,
    /// The author's handle.
    pub username: String,
    /// The author's avatar, if any.
    pub avatar_url: Option<String>,
}

impl From<&User> for SenderSummary {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id,
            username: user.username.clone(),
            avatar_url: user.avatar_url.clone(),
        }
    }
}

/// Delivery state of one recipient, as shown alongside a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    /// The recipient.
    pub receiver_id: UserId,
    /// Their delivery state.
    pub status: DeliveryStatus,
    /// Last transition timestamp.
    pub updated_at: DateTime<Utc>,
}

impl From<&MessageStatus> for StatusView {
    fn from(row: &MessageStatus) -> Self {
        Self {
            receiver_id: row.receiver_id,
            status: row.status,
            updated_at: row.updated_at,
        }
    }
}

/// A message as delivered to clients: the stored row plus its author and
/// per-recipient statuses.
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    /// The stored message.
    #[serde(flatten)]
    pub message: Message,
    /// Author profile.
    pub sender: SenderSummary,
    /// One entry per recipient.
    pub statuses: Vec<StatusView>,
}

impl MessageView {
    /// Assemble a view from its parts.
    #[must_use]
    pub fn new(message: Message, sender: SenderSummary, statuses: &[MessageStatus]) -> Self {
        Self {
            message,
            sender,
            statuses: statuses.iter().map(StatusView::from).collect(),
        }
    }
}

/// A conversation member with a live connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OnlineUser {
    /// The member.
    pub user_id: UserId,
    /// Their handle.
    pub username: String,
    /// Their persisted presence status.
    pub status: UserStatus,
}

/// Paging parameters for message history.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct HistoryQuery {
    /// Page size. Clamped to `1..=max_history_limit`.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Only return messages older than this one.
    #[serde(default)]
    pub before_message_id: Option<MessageId>,
}

/// One page of message history, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryPage {
    /// The messages in this page.
    pub messages: Vec<MessageView>,
    /// Whether older messages exist beyond this page.
    pub has_more: bool,
}

/// Paging and filter parameters for a user's notifications.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct NotificationQuery {
    /// One-based page number.
    #[serde(default)]
    pub page: Option<usize>,
    /// Page size. Clamped to `1..=max_notification_limit`.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Only return notifications in this seen state.
    #[serde(default)]
    pub is_seen: Option<bool>,
}

/// One page of notifications, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationPage {
    /// The notifications in this page.
    pub notifications: Vec<Notification>,
    /// One-based page number.
    pub current_page: usize,
    /// Page size used.
    pub per_page: usize,
    /// Notifications matching the filter, across all pages.
    pub total_count: usize,
    /// Number of pages at this page size.
    pub total_pages: usize,
}

/// Result of a successful send.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    /// The persisted message as fanned out.
    pub message: MessageView,
    /// Every participant except the sender.
    pub recipients: Vec<UserId>,
    /// Recipients left without a status row because the rows could not be
    /// written. Either empty or every recipient.
    pub missing_statuses: Vec<UserId>,
    /// Recipients who were offline and received a notification.
    pub notified_offline: Vec<UserId>,
    /// Number of live connections the message was queued to.
    pub live_deliveries: usize,
}

/// Result of a delivery status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    /// The message.
    pub message_id: MessageId,
    /// The recipient whose row was targeted.
    pub receiver_id: UserId,
    /// Conversation of the message.
    pub conversation_id: ConversationId,
    /// State of the row after the call.
    pub status: DeliveryStatus,
    /// Whether the row moved forward.
    pub changed: bool,
    /// Whether the sender was sent a `message_status_updated` event.
    pub sender_notified: bool,
}
