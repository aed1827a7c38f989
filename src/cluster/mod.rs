//! Sharding coordinator
//!
//! A `Cluster` owns one model's ordered shard list and its schema.
//! Creation routes to a uniformly random shard; every operation that
//! must consider "all records of the model" fans out to each shard on
//! its own task and waits for all of them.
//!
//! The fan-out is fail-fast: the first shard error aborts the whole
//! operation and cancels the remaining workers. A single shard outage
//! therefore fails every broadcast, a deliberate
//! availability/consistency trade-off.
//!
//! Cross-shard consistency is not guaranteed: a query racing a write
//! can observe one shard's post-write state and another shard's
//! pre-write state. Within one shard the script programs keep record
//! and index state indivisible.

pub mod config;
pub mod errors;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use rand::Rng;
use tokio::task::JoinSet;

use crate::index::{IndexResult, Predicate};
use crate::model::{AttrValue, ModelSchema, Record, RecordId};
use crate::observability::Logger;
use crate::shard::Shard;

pub use config::ClusterConfig;
pub use errors::{ClusterError, ClusterResult};

/// Coordinator for one model over an ordered shard set
pub struct Cluster {
    schema: Arc<ModelSchema>,
    shards: Vec<Arc<Shard>>,
}

impl Cluster {
    /// Connect every configured shard and register the model on it.
    ///
    /// Loads the script programs on each connection and propagates the
    /// schema's declared TTL to the per-shard metadata key, so the
    /// create/update programs observe it from the first write.
    pub async fn connect(config: ClusterConfig, schema: ModelSchema) -> ClusterResult<Self> {
        if config.is_empty() {
            return Err(ClusterError::NoShards {
                model: schema.name().to_string(),
            });
        }

        let schema = Arc::new(schema);
        let mut shards = Vec::with_capacity(config.len());
        for (ordinal, store) in config.into_stores().into_iter().enumerate() {
            let shard = Shard::connect(ordinal, store).await.map_err(|source| {
                ClusterError::ShardFanOut {
                    model: schema.name().to_string(),
                    shard: ordinal,
                    operation: "connect",
                    source: source.into(),
                }
            })?;
            shards.push(Arc::new(shard));
        }

        let cluster = Self { schema, shards };
        crate::ttl::change_ttl_passive(&cluster, cluster.schema.ttl()).await?;
        Ok(cluster)
    }

    /// The model this cluster coordinates
    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    /// Connected shards, in configuration order
    pub fn shards(&self) -> &[Arc<Shard>] {
        &self.shards
    }

    /// Create a record, placing it on a uniformly random shard.
    ///
    /// Placement is random rather than keyed, so queries always fan
    /// out to every shard.
    pub async fn create(&self, attrs: HashMap<String, AttrValue>) -> ClusterResult<Record> {
        // Validate locally so a bad attribute map never reads as a
        // shard failure.
        self.schema.encode_attrs(&attrs)?;

        let shard = &self.shards[rand::thread_rng().gen_range(0..self.shards.len())];
        let id = shard
            .create(&self.schema, &attrs)
            .await
            .map_err(|source| self.shard_error(shard.ordinal(), "create", source))?;
        Ok(Record::new(id, attrs))
    }

    /// Fetch a record by id from whichever shard holds it
    pub async fn find(&self, id: RecordId) -> ClusterResult<Record> {
        let found = self
            .fan_out("find", move |shard, schema| async move {
                shard.find(&schema, id).await
            })
            .await?;
        found
            .into_iter()
            .flatten()
            .next()
            .ok_or_else(|| ClusterError::RecordNotFound {
                model: self.schema.name().to_string(),
                id,
            })
    }

    /// Update fields of a record wherever it lives.
    ///
    /// Broadcast to all shards; the owning shard migrates index
    /// entries, every other shard no-ops. Updating an id that exists
    /// nowhere is a successful no-op.
    pub async fn update(
        &self,
        id: RecordId,
        attrs: HashMap<String, AttrValue>,
    ) -> ClusterResult<()> {
        self.schema.encode_attrs(&attrs)?;

        let attrs = Arc::new(attrs);
        self.fan_out("update", move |shard, schema| {
            let attrs = attrs.clone();
            async move { shard.update(&schema, id, &attrs).await }
        })
        .await?;
        Ok(())
    }

    /// Delete a record wherever it lives. Idempotent.
    pub async fn delete(&self, id: RecordId) -> ClusterResult<()> {
        self.fan_out("delete", move |shard, schema| async move {
            shard.delete(&schema, id).await
        })
        .await?;
        Ok(())
    }

    /// Records matching every predicate, merged across shards.
    ///
    /// Ids are unique per shard and distinct across shards by the id
    /// scheme, so the merge is a union; sorting by id makes the merged
    /// order deterministic.
    pub async fn query(
        &self,
        predicates: Vec<Predicate>,
        projection: Option<Vec<String>>,
    ) -> ClusterResult<Vec<Record>> {
        let predicates = Arc::new(predicates);
        let projection = Arc::new(projection);
        let per_shard = self
            .fan_out("query", move |shard, schema| {
                let predicates = predicates.clone();
                let projection = projection.clone();
                async move {
                    shard
                        .query(&schema, &predicates, projection.as_deref())
                        .await
                }
            })
            .await?;

        let mut records: Vec<Record> = per_shard.into_iter().flatten().collect();
        records.sort_by_key(Record::id);
        Ok(records)
    }

    /// Count of records matching every predicate, summed across shards
    pub async fn count(&self, predicates: Vec<Predicate>) -> ClusterResult<usize> {
        let predicates = Arc::new(predicates);
        let counts = self
            .fan_out("count", move |shard, schema| {
                let predicates = predicates.clone();
                async move { shard.query_count(&schema, &predicates).await }
            })
            .await?;
        Ok(counts.into_iter().sum())
    }

    /// Run one worker per shard and wait for all of them.
    ///
    /// Results come back in shard order. The first shard failure wins:
    /// it aborts the call, and dropping the task set cancels workers
    /// still in flight.
    pub(crate) async fn fan_out<T, F, Fut>(
        &self,
        operation: &'static str,
        per_shard: F,
    ) -> ClusterResult<Vec<T>>
    where
        F: Fn(Arc<Shard>, Arc<ModelSchema>) -> Fut,
        Fut: Future<Output = IndexResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let mut workers = JoinSet::new();
        for shard in &self.shards {
            let ordinal = shard.ordinal();
            let work = per_shard(shard.clone(), self.schema.clone());
            workers.spawn(async move { (ordinal, work.await) });
        }

        let mut results = Vec::with_capacity(self.shards.len());
        while let Some(joined) = workers.join_next().await {
            let (ordinal, result) = joined.map_err(|e| ClusterError::WorkerAborted {
                model: self.schema.name().to_string(),
                operation,
                message: e.to_string(),
            })?;
            match result {
                Ok(value) => results.push((ordinal, value)),
                Err(source) => {
                    Logger::error(
                        "shard_fan_out_failed",
                        &[
                            ("model", self.schema.name()),
                            ("operation", operation),
                            ("shard", &ordinal.to_string()),
                        ],
                    );
                    return Err(self.shard_error(ordinal, operation, source));
                }
            }
        }

        results.sort_by_key(|(ordinal, _)| *ordinal);
        Ok(results.into_iter().map(|(_, value)| value).collect())
    }

    fn shard_error(
        &self,
        shard: usize,
        operation: &'static str,
        source: crate::index::IndexError,
    ) -> ClusterError {
        ClusterError::ShardFanOut {
            model: self.schema.name().to_string(),
            shard,
            operation,
            source,
        }
    }
}
