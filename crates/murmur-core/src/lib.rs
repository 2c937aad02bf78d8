//! Core types and utilities for murmur.
//!
//! This crate provides the foundational types used throughout the murmur
//! messaging core:
//!
//! - **Identifiers**: Strongly-typed IDs for users, conversations, messages,
//!   notifications, and live connections
//! - **Parse errors**: The shared `IdError` returned when an identifier is malformed
//!
//! # Example
//!
//! ```
//! use murmur_core::{ConnectionId, ConversationId, UserId};
//!
//! // Parse a conversation ID from a path segment
//! let conversation_id: ConversationId = "12".parse().unwrap();
//!
//! // Numeric IDs can also be built directly
//! let user_id = UserId::new(7);
//!
//! // Every socket gets its own random connection ID
//! let connection_id = ConnectionId::generate();
//! # let _ = (conversation_id, user_id, connection_id);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;

pub use ids::{ConnectionId, ConversationId, IdError, MessageId, NotificationId, UserId};
