//! Real-time messaging core for murmur.
//!
//! This crate owns everything that happens between an authenticated
//! connection and the store: message dispatch, delivery status, presence,
//! typing signals, notifications, and the live fanout that ties them
//! together.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                Gateway (WebSocket + REST)                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        ChatService                          │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────┐    │
//! │  │ Dispatch │ │  Status  │ │ Presence │ │   Signals    │    │
//! │  └──────────┘ └──────────┘ └──────────┘ └──────────────┘    │
//! │  ┌─────────────────────────┐ ┌─────────────────────────┐    │
//! │  │   ConnectionRegistry    │ │      RoomManager        │    │
//! │  │   (user -> connection)  │ │ (conversation -> conns) │    │
//! │  └─────────────────────────┘ └─────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                       ┌────────────┐
//!                       │   Store    │
//!                       │ (RocksDB)  │
//!                       └────────────┘
//! ```
//!
//! Every connection owns a bounded outbound queue. Fanout never waits on a
//! recipient: a full queue drops the event for that recipient only.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use murmur_realtime::{ChatCore, ChatService};
//! use murmur_store::{RocksStore, Store};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(RocksStore::open("/tmp/murmur")?);
//! let alice = store.create_user("alice", None, None)?.user_id;
//! let bob = store.create_user("bob", None, None)?.user_id;
//! let chat = store.create_conversation(false, None, &[alice, bob])?;
//!
//! let service = ChatService::with_defaults(store);
//! let (session, mut events) = service.connect(bob).await?;
//!
//! service
//!     .send_message(alice, chat.conversation_id, "hello")
//!     .await?;
//! while let Ok(event) = events.try_recv() {
//!     println!("{}", event.name());
//! }
//! service.disconnect(&session).await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod connection;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod notify;
pub mod presence;
pub mod registry;
pub mod rooms;
pub mod service;
pub mod signals;
pub mod status;
pub mod types;

#[cfg(test)]
mod testing;

pub use connection::ConnectionHandle;
pub use error::{ChatError, ErrorKind, Result, BLOCKED_MESSAGE};
pub use events::{ClientCommand, ServerEvent, INVALID_FRAME_MESSAGE};
pub use registry::ConnectionRegistry;
pub use rooms::RoomManager;
pub use service::{ChatCore, ChatService, ClientSession};
pub use types::{
    ChatConfig, HistoryPage, HistoryQuery, MessageView, NotificationPage, NotificationQuery,
    OnlineUser, SendOutcome, SenderSummary, StatusChange, StatusView,
};

// Re-export commonly used types from dependencies for convenience
pub use murmur_core::{ConnectionId, ConversationId, MessageId, NotificationId, UserId};
pub use murmur_store::{DeliveryStatus, Notification, UserStatus};
