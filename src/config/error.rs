//! Configuration errors

use thiserror::Error;

/// Problems found while loading or validating settings. All of them are
/// fatal at initialization.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown cache provider: {0}")]
    UnknownProvider(String),

    #[error("Unsupported digest algorithm: {0} (supported: sha512, sha384, sha256, sha224, md5)")]
    UnsupportedDigest(String),

    #[error("Missing required setting `{0}`")]
    MissingField(&'static str),

    #[error("Invalid value for `{key}`: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

impl ConfigError {
    pub fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key,
            reason: reason.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
