//! Top-level error type
//!
//! Every public `QueryCache` operation returns [`Result`]. Layer errors are
//! folded in unchanged so callers can still match on the specific cause.

use crate::cache::CacheError;
use crate::config::ConfigError;
use crate::database::{DatabaseError, PoolError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryCacheError {
    /// Bad settings: unknown provider, unsupported digest, missing field
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The cache store failed an operation
    #[error("Cache provider error: {0}")]
    Provider(#[from] CacheError),

    /// The statement failed or the connection dropped
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Connection pool error: {0}")]
    Pool(PoolError),

    /// A cached value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<PoolError> for QueryCacheError {
    fn from(error: PoolError) -> Self {
        match error {
            PoolError::Database(e) => Self::Database(e),
            other => Self::Pool(other),
        }
    }
}

impl QueryCacheError {
    /// Configuration problems cannot be retried
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, QueryCacheError>;
