//! Query construction and execution errors

use thiserror::Error;

use crate::cluster::ClusterError;
use crate::model::ModelError;

/// Result type for query building and execution
pub type QueryResult<T> = Result<T, QueryError>;

/// Query errors.
///
/// Construction problems surface when the chain method is called, not
/// when the query runs, so the error points at the mistake.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// Predicate references an attribute with no index
    #[error("attribute '{attribute}' on model '{model}' is not indexed and cannot appear in a predicate")]
    UnindexedAttribute { model: String, attribute: String },

    /// Range predicate on an exact-indexed attribute
    #[error("attribute '{attribute}' on model '{model}' has an exact index; range predicates need a range index")]
    RangeOnExactAttribute { model: String, attribute: String },

    /// A projection and an in-process filter cannot be combined
    #[error("select and an in-process filter cannot be combined on one query")]
    ProjectionWithFilter,

    /// Terminal operation invoked with no predicates
    #[error("a query needs at least one predicate")]
    NoPredicates,

    /// Unknown attribute or value type mismatch
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The coordinator call failed
    #[error(transparent)]
    Cluster(#[from] ClusterError),
}
