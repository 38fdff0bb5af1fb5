use std::error::Error;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for durable storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result alias for fast cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Error raised by durable storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A write was attempted against a record whose version moved since it was read.
    #[error("{resource} `{id}` was modified concurrently (expected version {expected}, found {actual})")]
    Conflict {
        resource: &'static str,
        id: Uuid,
        expected: u64,
        actual: u64,
    },
    /// A unique constraint rejected the write.
    #[error("{resource} with {field} `{value}` already exists")]
    Duplicate {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    /// The record a write depends on does not exist.
    #[error("{resource} `{id}` does not exist")]
    NotFound { resource: &'static str, id: Uuid },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

/// Error raised by the fast cache. The cache is never authoritative, so callers
/// treat every variant as "no answer" and fall back to the durable store.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Option<Box<dyn Error + Send + Sync>>,
    },
}

impl CacheError {
    /// Construct an unavailable error without an underlying cause.
    pub fn unavailable(message: impl Into<String>) -> Self {
        CacheError::Unavailable {
            message: message.into(),
            source: None,
        }
    }
}
