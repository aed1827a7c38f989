//! Index engine
//!
//! Per-shard secondary indexing. Mutations go through the atomic
//! script programs so the record hash and every affected index entry
//! change as one indivisible step; lookups resolve predicates against
//! the index keys and intersect the candidate id sets.

pub mod engine;
pub mod errors;

use crate::model::AttrValue;
use crate::store::ScoreBound;

pub use engine::{IndexEngine, ScriptSet};
pub use errors::{IndexError, IndexResult};

/// One conjunct of a query.
///
/// Equality is allowed on any indexed attribute; range predicates only
/// on range-indexed attributes. Both constraints are enforced when the
/// query is built, so the engine can assume well-formed input.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Attribute equals the value
    Eq {
        /// Attribute name
        attr: String,
        /// Value to match
        value: AttrValue,
    },
    /// Attribute's numeric encoding lies inside the bounds
    Range {
        /// Attribute name
        attr: String,
        /// Lower bound
        min: ScoreBound,
        /// Upper bound
        max: ScoreBound,
    },
}

impl Predicate {
    /// The attribute this predicate constrains
    pub fn attr(&self) -> &str {
        match self {
            Predicate::Eq { attr, .. } | Predicate::Range { attr, .. } => attr,
        }
    }
}
