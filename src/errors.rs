/// Error types
use thiserror::Error;

use crate::favorites::FavoriteKind;

/// Failures of the external key-value store
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StorageError {
    #[error("storage read failed: {0}")]
    Read(String),
    #[error("storage write failed: {0}")]
    Write(String),
    #[error("stored value for `{key}` is malformed: {message}")]
    Malformed { key: String, message: String },
}

/// Failures delivering a cross-context message. Never fatal.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NotifyError {
    #[error("message could not be encoded: {0}")]
    Encode(String),
    #[error("message delivery failed: {0}")]
    Delivery(String),
}

/// Errors surfaced by favorite store operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("\"{name}\" is already in {kind} favorites")]
    Duplicate { kind: FavoriteKind, name: String },
    #[error("limit reached ({limit}) for {kind} favorites")]
    LimitExceeded { kind: FavoriteKind, limit: usize },
    #[error("\"{name}\" is not in {kind} favorites")]
    NotFound { kind: FavoriteKind, name: String },
    #[error("please enter a name")]
    EmptyName,
    #[error("no active search on this page")]
    NoActiveSearch,
    #[error("save error: {0}")]
    Persistence(String),
    #[error("invalid import file: {0}")]
    ImportFormat(String),
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}

impl From<StorageError> for StoreError {
    fn from(e: StorageError) -> Self {
        StoreError::Persistence(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_messages() {
        let duplicate = StoreError::Duplicate {
            kind: FavoriteKind::Tag,
            name: "wolf".to_string(),
        };
        assert_eq!(duplicate.to_string(), "\"wolf\" is already in tag favorites");

        let limit = StoreError::LimitExceeded {
            kind: FavoriteKind::Artist,
            limit: 100,
        };
        assert_eq!(limit.to_string(), "limit reached (100) for artist favorites");
    }

    #[test]
    fn test_storage_error_becomes_persistence() {
        let err: StoreError = StorageError::Write("quota exceeded".to_string()).into();
        assert_eq!(
            err,
            StoreError::Persistence("storage write failed: quota exceeded".to_string())
        );
    }
}
