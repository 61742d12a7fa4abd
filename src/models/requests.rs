//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies.

use std::time::Duration;

use serde::Deserialize;

use crate::cache::{MAX_KEY_LENGTH, MAX_VALUE_SIZE};

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: The value to store
/// - `ttl`: Optional TTL in seconds (uses the server default if not specified)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: String,
    /// Optional TTL in seconds; 0 stores an already expired entry
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            ));
        }
        if self.value.len() > MAX_VALUE_SIZE {
            return Some(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            ));
        }
        None
    }

    /// Resolves the TTL to store, falling back to `default` when absent.
    pub fn effective_ttl(&self, default: Option<Duration>) -> Option<Duration> {
        match self.ttl {
            Some(secs) => Some(Duration::from_secs(secs)),
            None => default,
        }
    }
}
