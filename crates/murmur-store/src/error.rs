//! Error types for the storage layer.

use thiserror::Error;

/// A result type using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record was not found.
    #[error("record not found")]
    NotFound,

    /// A record with the same unique key already exists.
    #[error("record already exists: {0}")]
    AlreadyExists(String),

    /// The write was rejected because it would break a record constraint.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<rocksdb::Error> for StoreError {
    fn from(err: rocksdb::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<murmur_core::IdError> for StoreError {
    fn from(err: murmur_core::IdError) -> Self {
        Self::Serialization(format!("malformed index key: {err}"))
    }
}
