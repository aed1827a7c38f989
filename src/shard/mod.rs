//! Shard handle
//!
//! One shard is one independent store instance. The handle pairs the
//! connection with the script set loaded on it and exposes the index
//! engine operations the coordinator fans out to.

use std::collections::HashMap;
use std::sync::Arc;

use crate::index::{IndexEngine, IndexResult, Predicate, ScriptSet};
use crate::model::{AttrValue, ModelSchema, Record, RecordId};
use crate::observability::{Logger, Severity};
use crate::store::{Store, StoreResult};

/// A connected shard: ordinal position, connection, loaded scripts
pub struct Shard {
    ordinal: usize,
    store: Arc<dyn Store>,
    scripts: ScriptSet,
}

impl Shard {
    /// Establish a shard: load the mutation programs on the
    /// connection so later invocations go by handle.
    pub async fn connect(ordinal: usize, store: Arc<dyn Store>) -> StoreResult<Self> {
        let scripts = ScriptSet::load(store.as_ref()).await?;
        Logger::log(
            Severity::Info,
            "shard_connected",
            &[("shard", &ordinal.to_string())],
        );
        Ok(Self {
            ordinal,
            store,
            scripts,
        })
    }

    /// Position of this shard in the cluster's ordered shard list
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// The underlying store connection. Administrative paths (TTL
    /// metadata, expiry migration) drive it directly.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    fn engine<'a>(&'a self, schema: &'a ModelSchema) -> IndexEngine<'a> {
        IndexEngine::new(self.store.as_ref(), schema, &self.scripts)
    }

    /// Create a record on this shard
    pub async fn create(
        &self,
        schema: &ModelSchema,
        attrs: &HashMap<String, AttrValue>,
    ) -> IndexResult<RecordId> {
        self.engine(schema).create(attrs).await
    }

    /// Update a record if it lives here; returns whether it did
    pub async fn update(
        &self,
        schema: &ModelSchema,
        id: RecordId,
        attrs: &HashMap<String, AttrValue>,
    ) -> IndexResult<bool> {
        self.engine(schema).update(id, attrs).await
    }

    /// Delete a record if it lives here; returns whether it did
    pub async fn delete(&self, schema: &ModelSchema, id: RecordId) -> IndexResult<bool> {
        self.engine(schema).delete(id).await
    }

    /// Fetch a record if it lives here
    pub async fn find(&self, schema: &ModelSchema, id: RecordId) -> IndexResult<Option<Record>> {
        self.engine(schema).find(id).await
    }

    /// Records on this shard matching every predicate
    pub async fn query(
        &self,
        schema: &ModelSchema,
        predicates: &[Predicate],
        projection: Option<&[String]>,
    ) -> IndexResult<Vec<Record>> {
        self.engine(schema).query(predicates, projection).await
    }

    /// Count of records on this shard matching every predicate
    pub async fn query_count(
        &self,
        schema: &ModelSchema,
        predicates: &[Predicate],
    ) -> IndexResult<usize> {
        self.engine(schema).count(predicates).await
    }
}

impl std::fmt::Debug for Shard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shard").field("ordinal", &self.ordinal).finish()
    }
}
