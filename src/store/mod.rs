//! Store protocol
//!
//! The seam between the indexing layer and the underlying key-value
//! store. A `Store` is one independent instance (one shard) providing:
//!
//! - string get/set, key delete and expiry control
//! - hash reads
//! - set add/remove/members
//! - sorted-set add/remove/range-by-score
//! - atomic server-side script execution
//! - non-blocking cursor-based key iteration by pattern
//!
//! All record and index writes go through the script programs; the
//! remaining write methods exist because the protocol requires them of
//! any conforming store and the administrative paths (TTL metadata,
//! expiry migration) use them directly.

pub mod errors;
pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;

pub use errors::{StoreError, StoreResult};
pub use memory::MemoryStore;

/// Handle to a loaded script program.
///
/// Opaque to callers: a Redis-compatible store returns the SHA of the
/// loaded source, the in-memory store returns a program token. Load
/// once per connection, invoke by handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScriptHandle(String);

impl ScriptHandle {
    /// Wrap a store-issued handle token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw handle token
    pub fn token(&self) -> &str {
        &self.0
    }
}

/// Reply from a script invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptReply {
    /// Script returned nil
    Nil,
    /// Script returned an integer
    Int(i64),
    /// Script returned a string
    Str(String),
}

impl ScriptReply {
    /// Integer reply, if this is one
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ScriptReply::Int(i) => Some(*i),
            _ => None,
        }
    }
}

/// Bound of a score range query
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreBound {
    /// No bound on this side
    Unbounded,
    /// Bound included in the range
    Inclusive(f64),
    /// Bound excluded from the range
    Exclusive(f64),
}

impl ScoreBound {
    /// Whether a score lies at or above this bound (as a minimum)
    pub fn admits_from_below(&self, score: f64) -> bool {
        match self {
            ScoreBound::Unbounded => true,
            ScoreBound::Inclusive(b) => score >= *b,
            ScoreBound::Exclusive(b) => score > *b,
        }
    }

    /// Whether a score lies at or below this bound (as a maximum)
    pub fn admits_from_above(&self, score: f64) -> bool {
        match self {
            ScoreBound::Unbounded => true,
            ScoreBound::Inclusive(b) => score <= *b,
            ScoreBound::Exclusive(b) => score < *b,
        }
    }
}

/// One store instance (one shard).
///
/// Implementations must guarantee that `run_script` executes a whole
/// program as one indivisible step relative to every other command on
/// the same instance; the indexing layer holds no locks of its own.
#[async_trait]
pub trait Store: Send + Sync {
    /// Read a string value
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a string value (clears any expiration on the key)
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Delete a key of any kind; returns whether it existed
    async fn del(&self, key: &str) -> StoreResult<bool>;

    /// Whether a key currently exists
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Read a whole hash; missing keys read as empty
    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    /// Read selected hash fields, preserving request order
    async fn hmget(&self, key: &str, fields: &[String]) -> StoreResult<Vec<Option<String>>>;

    /// Add a set member; returns whether it was newly added
    async fn sadd(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Remove a set member; returns whether it was present
    async fn srem(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// All members of a set; missing keys read as empty
    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Set cardinality
    async fn scard(&self, key: &str) -> StoreResult<usize>;

    /// Add or update a sorted-set member; returns whether it was new
    async fn zadd(&self, key: &str, member: &str, score: f64) -> StoreResult<bool>;

    /// Remove a sorted-set member; returns whether it was present
    async fn zrem(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Score of a sorted-set member
    async fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<f64>>;

    /// Members with scores inside the given bounds, score-ordered
    async fn zrangebyscore(
        &self,
        key: &str,
        min: ScoreBound,
        max: ScoreBound,
    ) -> StoreResult<Vec<String>>;

    /// Count of members with scores inside the given bounds
    async fn zcount(&self, key: &str, min: ScoreBound, max: ScoreBound) -> StoreResult<usize>;

    /// Set a key's time-to-live; returns false if the key is missing
    async fn expire(&self, key: &str, seconds: u64) -> StoreResult<bool>;

    /// Clear a key's time-to-live; returns whether one was cleared
    async fn persist(&self, key: &str) -> StoreResult<bool>;

    /// Remaining time-to-live in seconds. Follows the store protocol
    /// convention: `-1` means no expiration, `-2` means no such key.
    async fn ttl(&self, key: &str) -> StoreResult<i64>;

    /// One cursor step of a non-blocking keyspace iteration.
    ///
    /// Start with cursor `0`; iteration is complete when the returned
    /// cursor is `0`. Keys deleted or expired between steps are simply
    /// not returned.
    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> StoreResult<(u64, Vec<String>)>;

    /// Load a script program, returning the handle to invoke it by
    async fn script_load(&self, source: &str) -> StoreResult<ScriptHandle>;

    /// Execute a loaded program atomically
    async fn run_script(
        &self,
        handle: &ScriptHandle,
        keys: &[String],
        args: &[String],
    ) -> StoreResult<ScriptReply>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_bounds() {
        assert!(ScoreBound::Unbounded.admits_from_below(f64::MIN));
        assert!(ScoreBound::Inclusive(3.0).admits_from_below(3.0));
        assert!(!ScoreBound::Exclusive(3.0).admits_from_below(3.0));
        assert!(ScoreBound::Inclusive(3.0).admits_from_above(3.0));
        assert!(!ScoreBound::Exclusive(3.0).admits_from_above(3.0));
        assert!(ScoreBound::Exclusive(3.0).admits_from_above(2.5));
    }
}
