//! Index engine error types

use thiserror::Error;

use crate::model::ModelError;
use crate::store::StoreError;

/// Result type for index engine operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors surfaced by per-shard index operations
#[derive(Debug, Clone, Error)]
pub enum IndexError {
    /// Attribute validation or field decoding failed
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The store round trip failed
    #[error(transparent)]
    Store(#[from] StoreError),
}
