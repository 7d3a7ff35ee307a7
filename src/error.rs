/// Error types for the shortlink core
use thiserror::Error;

/// A call into the host storage area failed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("shortlink already exists: {0}")]
    Duplicate(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MessengerError {
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("unsupported message type: {0}")]
    Unsupported(i64),
    /// The background context handled the request and reported a failure
    #[error("{0}")]
    Rejected(String),
    #[error("message transport failed: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("shortlink must not be empty")]
    EmptyAlias,
    #[error("destination must not be empty")]
    EmptyDestination,
}
