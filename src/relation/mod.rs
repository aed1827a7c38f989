//! Relation: chainable, lazily evaluated queries
//!
//! A `Relation` is an immutable query description: a predicate
//! conjunction, an optional projection, and an optional in-process
//! filter. Chain methods return a new value; nothing evaluates until a
//! terminal operation (`count`, `all`, `first`) makes exactly one
//! coordinator call.
//!
//! Predicate validity is checked as the chain is built, so an
//! unindexed attribute fails at the line that names it.

pub mod errors;

use std::sync::Arc;

use crate::cluster::Cluster;
use crate::index::Predicate;
use crate::model::{AttrValue, IndexKind, ModelError, Record};
use crate::store::ScoreBound;

pub use errors::{QueryError, QueryResult};

type FilterFn = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

/// A chainable query against one model's cluster
#[derive(Clone)]
pub struct Relation {
    cluster: Arc<Cluster>,
    predicates: Vec<Predicate>,
    projection: Option<Vec<String>>,
    post_filter: Option<FilterFn>,
}

impl Relation {
    /// Start an empty query; add predicates before running it
    pub fn new(cluster: Arc<Cluster>) -> Self {
        Self {
            cluster,
            predicates: Vec::new(),
            projection: None,
            post_filter: None,
        }
    }

    /// Add an equality predicate. Allowed on any indexed attribute.
    pub fn where_eq(mut self, attr: &str, value: impl Into<AttrValue>) -> QueryResult<Self> {
        let value = value.into();
        let schema = self.cluster.schema();
        let def = schema
            .attribute(attr)
            .ok_or_else(|| ModelError::UnknownAttribute {
                model: schema.name().to_string(),
                attribute: attr.to_string(),
            })?;
        if def.index_kind() == IndexKind::None {
            return Err(QueryError::UnindexedAttribute {
                model: schema.name().to_string(),
                attribute: attr.to_string(),
            });
        }
        if value.attr_type() != def.attr_type {
            return Err(ModelError::type_mismatch(attr, def.attr_type, value.attr_type()).into());
        }

        self.predicates.push(Predicate::Eq {
            attr: attr.to_string(),
            value,
        });
        Ok(self)
    }

    /// Add a range predicate. Allowed only on range-indexed attributes.
    pub fn where_range(mut self, attr: &str, min: ScoreBound, max: ScoreBound) -> QueryResult<Self> {
        let schema = self.cluster.schema();
        match schema.index_kind(attr) {
            IndexKind::Range => {}
            IndexKind::Exact => {
                return Err(QueryError::RangeOnExactAttribute {
                    model: schema.name().to_string(),
                    attribute: attr.to_string(),
                })
            }
            IndexKind::None => {
                return Err(QueryError::UnindexedAttribute {
                    model: schema.name().to_string(),
                    attribute: attr.to_string(),
                })
            }
        }

        self.predicates.push(Predicate::Range {
            attr: attr.to_string(),
            min,
            max,
        });
        Ok(self)
    }

    /// Project the results onto the given attributes.
    ///
    /// Only the selected fields are fetched; everything else reads as
    /// unset on the returned records. Replaces any earlier projection.
    /// Cannot be combined with an in-process filter, which needs full
    /// records to run against.
    pub fn select(mut self, attrs: &[&str]) -> QueryResult<Self> {
        if self.post_filter.is_some() {
            return Err(QueryError::ProjectionWithFilter);
        }
        let schema = self.cluster.schema();
        for attr in attrs {
            if schema.attribute(attr).is_none() {
                return Err(ModelError::UnknownAttribute {
                    model: schema.name().to_string(),
                    attribute: attr.to_string(),
                }
                .into());
            }
        }
        self.projection = Some(attrs.iter().map(|a| a.to_string()).collect());
        Ok(self)
    }

    /// Filter results in-process after fetch.
    ///
    /// The filter can express predicates outside the indexable set, at
    /// the cost of materializing every index-matched candidate first.
    /// Cannot be combined with a projection.
    pub fn filter(
        mut self,
        predicate: impl Fn(&Record) -> bool + Send + Sync + 'static,
    ) -> QueryResult<Self> {
        if self.projection.is_some() {
            return Err(QueryError::ProjectionWithFilter);
        }
        self.post_filter = Some(Arc::new(predicate));
        Ok(self)
    }

    /// Count matching records.
    ///
    /// Index-only unless an in-process filter is present, which forces
    /// materialization.
    pub async fn count(&self) -> QueryResult<usize> {
        self.require_predicates()?;
        if self.post_filter.is_some() {
            return Ok(self.all().await?.len());
        }
        Ok(self.cluster.count(self.predicates.clone()).await?)
    }

    /// Materialize all matching records, merged across shards in id
    /// order.
    pub async fn all(&self) -> QueryResult<Vec<Record>> {
        self.require_predicates()?;
        let mut records = self
            .cluster
            .query(self.predicates.clone(), self.projection.clone())
            .await?;
        if let Some(filter) = &self.post_filter {
            records.retain(|record| filter(record));
        }
        Ok(records)
    }

    /// First record of the deterministic merged order, if any
    pub async fn first(&self) -> QueryResult<Option<Record>> {
        Ok(self.all().await?.into_iter().next())
    }

    fn require_predicates(&self) -> QueryResult<()> {
        if self.predicates.is_empty() {
            return Err(QueryError::NoPredicates);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relation")
            .field("model", &self.cluster.schema().name())
            .field("predicates", &self.predicates)
            .field("projection", &self.projection)
            .field("filtered", &self.post_filter.is_some())
            .finish()
    }
}
