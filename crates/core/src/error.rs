//! Storage error model.

use thiserror::Error;

/// Result type returned by storage backends.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure reported by an entity, enrollment-token or role store.
///
/// Backends map their native failures onto these variants; the engine wraps
/// them as `AuthError::Storage` and decides per call site whether to surface them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The record addressed by a write/delete does not exist.
    #[error("record not found")]
    NotFound,

    /// The backend could not read or write its medium.
    #[error("io failure: {0}")]
    Io(String),

    /// A stored record could not be encoded or decoded.
    #[error("serialization failure: {0}")]
    Serialization(String),

    /// An in-process lock guarding the backend was poisoned.
    #[error("store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}
