//! Cluster error types

use thiserror::Error;

use crate::index::IndexError;
use crate::model::{ModelError, RecordId};

/// Result type for cluster operations
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors surfaced by coordinator operations
#[derive(Debug, Clone, Error)]
pub enum ClusterError {
    /// A cluster needs at least one shard
    #[error("model '{model}' configured with an empty shard set")]
    NoShards { model: String },

    /// Local attribute validation failed before any shard was touched
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The id is absent on every shard
    #[error("no record {id} on any shard of model '{model}'")]
    RecordNotFound { model: String, id: RecordId },

    /// First per-shard failure of a broadcast. The whole operation is
    /// aborted; there is no partial-success reporting.
    #[error("shard {shard} failed during {operation} on model '{model}': {source}")]
    ShardFanOut {
        model: String,
        shard: usize,
        operation: &'static str,
        #[source]
        source: IndexError,
    },

    /// A fan-out worker stopped without reporting a result
    #[error("fan-out worker for {operation} on model '{model}' aborted: {message}")]
    WorkerAborted {
        model: String,
        operation: &'static str,
        message: String,
    },
}
