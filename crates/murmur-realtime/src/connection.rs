//! Per-connection outbound handle.
//!
//! Each live socket owns a bounded queue of [`ServerEvent`]s drained by its
//! writer task. Everything else in the core holds a cloned
//! [`ConnectionHandle`] and pushes into that queue without awaiting.

use murmur_core::{ConnectionId, UserId};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::events::ServerEvent;

/// A cloneable reference to one live connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    user_id: UserId,
    tx: mpsc::Sender<ServerEvent>,
}

impl ConnectionHandle {
    /// Create a handle for `user_id` with a fresh `ConnectionId` and an
    /// outbound queue of `capacity` events (at least one).
    #[must_use]
    pub fn channel(user_id: UserId, capacity: usize) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id: ConnectionId::generate(),
            user_id,
            tx,
        };
        (handle, rx)
    }

    /// The connection's unique ID.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// The authenticated user behind the connection.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Queue an event without waiting.
    ///
    /// Returns `false` if the event was dropped because the queue is full or
    /// the connection has gone away.
    pub fn send(&self, event: ServerEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::warn!(
                    connection_id = %self.id,
                    user_id = %self.user_id,
                    event = event.name(),
                    "Outbound queue full, dropping event"
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}
