//! Provider-specific settings map

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Free-form settings handed to the selected cache provider.
///
/// Each provider reads the keys it understands (`max_entries`, `directory`,
/// `url`, ...) and ignores the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderOptions {
    values: HashMap<String, Value>,
}

impl ProviderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests and programmatic setup
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Read an unsigned integer setting; numeric strings are accepted
    pub fn get_u64(&self, key: &str) -> Result<Option<u64>, String> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| format!("`{key}` must be a non-negative integer, got {n}")),
            Some(Value::String(s)) => s
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|e| format!("`{key}` must be a non-negative integer: {e}")),
            Some(other) => Err(format!(
                "`{key}` must be a non-negative integer, got {other}"
            )),
        }
    }

    /// Read a string setting
    pub fn get_str(&self, key: &str) -> Result<Option<&str>, String> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(format!("`{key}` must be a string, got {other}")),
        }
    }
}

impl From<HashMap<String, Value>> for ProviderOptions {
    fn from(values: HashMap<String, Value>) -> Self {
        Self { values }
    }
}
