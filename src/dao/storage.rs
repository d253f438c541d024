use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying key-value engine.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A persisted record failed schema validation or references data that no
    /// longer exists. Corruption signal, never a not-found.
    #[error("corrupt record at `{key}`: {message}")]
    Integrity { key: String, message: String },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct an integrity error for a malformed or dangling record.
    pub fn integrity(key: impl Into<String>, message: impl Into<String>) -> Self {
        StorageError::Integrity {
            key: key.into(),
            message: message.into(),
        }
    }
}
