//! Core identifier types for murmur.
//!
//! Durable records (users, conversations, messages, notifications) are keyed by
//! store-allocated 64-bit integers. Live connections are keyed by a random UUID
//! that only exists for the lifetime of the socket.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Defines a store-allocated numeric identifier.
///
/// Numeric IDs serialize as plain JSON numbers and encode as big-endian bytes
/// so that store keys sort in allocation order.
macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw numeric value.
            #[must_use]
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Return the raw numeric value.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }

            /// Return the big-endian byte encoding used in store keys.
            #[must_use]
            pub const fn to_be_bytes(self) -> [u8; 8] {
                self.0.to_be_bytes()
            }

            /// Decode an identifier from the first eight bytes of `bytes`.
            ///
            /// # Errors
            ///
            /// Returns an error if fewer than eight bytes are available.
            pub fn from_be_slice(bytes: &[u8]) -> Result<Self, IdError> {
                let arr: [u8; 8] = bytes
                    .get(..8)
                    .and_then(|b| b.try_into().ok())
                    .ok_or(IdError::InvalidLength {
                        expected: 8,
                        got: bytes.len(),
                    })?;
                Ok(Self(u64::from_be_bytes(arr)))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.parse::<u64>() {
                    Ok(0) | Err(_) => Err(IdError::InvalidNumber(s.to_string())),
                    Ok(value) => Ok(Self(value)),
                }
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

numeric_id! {
    /// Identifier of a registered user.
    ///
    /// Resolved from the `userId` claim of a bearer token.
    UserId
}

numeric_id! {
    /// Identifier of a conversation (direct or group).
    ConversationId
}

numeric_id! {
    /// Identifier of a message within the store.
    ///
    /// Message IDs grow monotonically, so ordering by ID matches creation order.
    MessageId
}

numeric_id! {
    /// Identifier of a notification row.
    NotificationId
}

/// A 16-byte identifier for a single live socket, based on UUID v4.
///
/// A user who reconnects gets a new `ConnectionId`; the registry uses it to
/// tell a stale disconnect apart from the current connection.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Create a new `ConnectionId` from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Generate a new random `ConnectionId`.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Return the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl FromStr for ConnectionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = uuid::Uuid::parse_str(s).map_err(|_| IdError::InvalidUuid)?;
        Ok(Self(uuid))
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", self.0)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ConnectionId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ConnectionId> for String {
    fn from(id: ConnectionId) -> Self {
        id.0.to_string()
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is not a positive integer.
    #[error("invalid numeric identifier: {0}")]
    InvalidNumber(String),

    /// The input has an incorrect length.
    #[error("invalid length: expected {expected} bytes, got {got}")]
    InvalidLength {
        /// The expected number of bytes.
        expected: usize,
        /// The actual number of bytes.
        got: usize,
    },

    /// The input is not a valid UUID.
    #[error("invalid UUID format")]
    InvalidUuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_id_parses_positive_integers() {
        let id: ConversationId = "42".parse().unwrap();
        assert_eq!(id.get(), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn numeric_id_rejects_zero_and_garbage() {
        assert!(matches!(
            "0".parse::<UserId>(),
            Err(IdError::InvalidNumber(_))
        ));
        assert!(matches!(
            "abc".parse::<UserId>(),
            Err(IdError::InvalidNumber(_))
        ));
        assert!(matches!(
            "-3".parse::<MessageId>(),
            Err(IdError::InvalidNumber(_))
        ));
    }

    #[test]
    fn numeric_id_big_endian_sorts_like_integers() {
        let low = MessageId::new(9).to_be_bytes();
        let high = MessageId::new(300).to_be_bytes();
        assert!(low < high);
        assert_eq!(MessageId::from_be_slice(&high).unwrap(), MessageId::new(300));
    }

    #[test]
    fn numeric_id_from_short_slice_fails() {
        let result = UserId::from_be_slice(&[1, 2, 3]);
        assert_eq!(
            result,
            Err(IdError::InvalidLength {
                expected: 8,
                got: 3
            })
        );
    }

    #[test]
    fn numeric_id_serializes_as_number() {
        let json = serde_json::to_string(&UserId::new(7)).unwrap();
        assert_eq!(json, "7");
        let parsed: UserId = serde_json::from_str("7").unwrap();
        assert_eq!(parsed, UserId::new(7));
    }

    #[test]
    fn connection_id_roundtrip() {
        let id = ConnectionId::generate();
        let parsed = ConnectionId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn connection_ids_are_unique() {
        assert_ne!(ConnectionId::generate(), ConnectionId::generate());
    }

    #[test]
    fn connection_id_invalid_uuid() {
        let result = ConnectionId::from_str("not-a-uuid");
        assert!(matches!(result, Err(IdError::InvalidUuid)));
    }
}
