//! Domain types stored in the database.
//!
//! These types represent the persisted state of users, conversations,
//! messages, per-recipient delivery status, blocks, and notifications.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use murmur_core::{ConversationId, MessageId, NotificationId, UserId};
use serde::{Deserialize, Serialize};

/// A user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier for the user.
    pub user_id: UserId,
    /// Unique handle shown to other users.
    pub username: String,
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// Optional avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Last persisted presence status.
    pub status: UserStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Self-reported presence of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    /// Connected and available.
    Online,
    /// Not connected, or explicitly hidden.
    #[default]
    Offline,
    /// Connected but not available.
    Busy,
}

impl UserStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Busy => "busy",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            "busy" => Ok(Self::Busy),
            other => Err(format!("unknown user status: {other}")),
        }
    }
}

/// A conversation record. Direct chats and groups share this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique identifier for the conversation.
    pub conversation_id: ConversationId,
    /// Whether this is a group conversation.
    pub is_group: bool,
    /// Optional display name, usually only set for groups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_name: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Membership of a user in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// The conversation.
    pub conversation_id: ConversationId,
    /// The member.
    pub user_id: UserId,
    /// When the user joined.
    pub joined_at: DateTime<Utc>,
}

/// A message record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier for the message.
    pub message_id: MessageId,
    /// Conversation the message belongs to.
    pub conversation_id: ConversationId,
    /// Author of the message.
    pub sender_id: UserId,
    /// Message body.
    pub content: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Delivery state of a message for one recipient.
///
/// Variants are declared in lifecycle order, so `Ord` reflects progress:
/// `Sent < Delivered < Read`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DeliveryStatus {
    /// Persisted, not yet confirmed by the recipient.
    #[default]
    Sent = 1,
    /// Received by a recipient device.
    Delivered = 2,
    /// Seen by the recipient.
    Read = 3,
}

impl DeliveryStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
        }
    }

    /// Convert the status to its numeric representation.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-recipient delivery record, unique on `(message_id, receiver_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageStatus {
    /// The message.
    pub message_id: MessageId,
    /// Conversation of the message, kept for bulk updates by conversation.
    pub conversation_id: ConversationId,
    /// The recipient this row tracks.
    pub receiver_id: UserId,
    /// Current delivery state.
    pub status: DeliveryStatus,
    /// Last transition timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A directed block: `blocker` does not want to hear from `blocked`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedPair {
    /// The user who created the block.
    pub blocker_id: UserId,
    /// The user being blocked.
    pub blocked_id: UserId,
    /// When the block was created.
    pub created_at: DateTime<Utc>,
}

/// Category of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A message arrived while the recipient was offline.
    NewMessage,
    /// The user was invited to a group conversation.
    GroupInvite,
    /// Platform-generated notice.
    System,
}

/// What a notification points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    /// A message; `reference_id` is a `MessageId`.
    Message,
    /// A conversation; `reference_id` is a `ConversationId`.
    Conversation,
    /// A user; `reference_id` is a `UserId`.
    User,
}

/// A notification record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Unique identifier for the notification.
    pub notification_id: NotificationId,
    /// Recipient of the notification.
    pub user_id: UserId,
    /// User whose action triggered it, if any.
    #[serde(default)]
    pub actor_id: Option<UserId>,
    /// Category.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Human-readable text.
    pub content: String,
    /// Kind of the referenced entity.
    #[serde(default)]
    pub reference_type: Option<ReferenceType>,
    /// Raw ID of the referenced entity.
    #[serde(default)]
    pub reference_id: Option<u64>,
    /// Whether the recipient has seen it.
    pub is_seen: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Fields supplied by the caller when creating a notification.
#[derive(Debug, Clone)]
pub struct NewNotification {
    /// Recipient of the notification.
    pub user_id: UserId,
    /// User whose action triggered it, if any.
    pub actor_id: Option<UserId>,
    /// Category.
    pub kind: NotificationKind,
    /// Human-readable text (1 to 1000 characters).
    pub content: String,
    /// Kind of the referenced entity.
    pub reference_type: Option<ReferenceType>,
    /// Raw ID of the referenced entity.
    pub reference_id: Option<u64>,
}
