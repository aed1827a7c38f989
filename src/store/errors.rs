//! Store error types

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by a store connection.
///
/// The core never retries either variant; retry policy belongs to the
/// connection layer above.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Store unreachable or timed out
    #[error("store connection failed: {0}")]
    Connection(String),

    /// A server-side script failed. The store's scripting guarantee
    /// means a failed program left no partial effect.
    #[error("script '{script}' failed: {message}")]
    Script { script: String, message: String },

    /// A key held a value of an unexpected kind
    #[error("key '{key}' holds a {found} value, expected {expected}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl StoreError {
    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a script execution error
    pub fn script(script: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Script {
            script: script.into(),
            message: message.into(),
        }
    }
}
