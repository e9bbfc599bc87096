//! Cache error types

use thiserror::Error;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// Provider could not be prepared (missing dependency, unreachable backend)
    #[error("Cache provider setup failed for '{provider}': {reason}")]
    Setup {
        provider: &'static str,
        reason: String,
    },

    /// Failed to connect to cache backend
    #[error("Cache connection error: {0}")]
    ConnectionError(String),

    /// Failed to serialize or deserialize cache value
    #[error("Cache serialization error: {0}")]
    SerializationError(String),

    /// Local storage failure (file-backed providers)
    #[error("Cache storage error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic backend error
    #[error("Cache backend error: {0}")]
    BackendError(String),
}

impl CacheError {
    pub fn setup(provider: &'static str, reason: impl Into<String>) -> Self {
        Self::Setup {
            provider,
            reason: reason.into(),
        }
    }
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
