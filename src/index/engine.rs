//! Per-shard index engine
//!
//! The engine is a view over one store connection, one model schema,
//! and that connection's loaded script set. It owns no state of its
//! own; a shard constructs one per operation.

use std::collections::{HashMap, HashSet};

use crate::keys;
use crate::model::{AttrValue, IndexKind, ModelSchema, Record, RecordId};
use crate::scripts::{MutationArgs, ScriptName};
use crate::store::{ScoreBound, ScriptHandle, Store, StoreResult};

use super::errors::IndexResult;
use super::Predicate;

/// The three mutation program handles for one connection.
///
/// Loaded once when the connection is established, invoked by handle
/// afterwards.
#[derive(Debug, Clone)]
pub struct ScriptSet {
    create: ScriptHandle,
    update: ScriptHandle,
    delete: ScriptHandle,
}

impl ScriptSet {
    /// Load all three programs on a connection
    pub async fn load(store: &dyn Store) -> StoreResult<Self> {
        Ok(Self {
            create: store.script_load(ScriptName::CreateRecord.source()).await?,
            update: store.script_load(ScriptName::UpdateRecord.source()).await?,
            delete: store.script_load(ScriptName::DeleteRecord.source()).await?,
        })
    }

    fn handle(&self, program: ScriptName) -> &ScriptHandle {
        match program {
            ScriptName::CreateRecord => &self.create,
            ScriptName::UpdateRecord => &self.update,
            ScriptName::DeleteRecord => &self.delete,
        }
    }
}

/// Index engine bound to one shard's connection
pub struct IndexEngine<'a> {
    store: &'a dyn Store,
    schema: &'a ModelSchema,
    scripts: &'a ScriptSet,
}

impl<'a> IndexEngine<'a> {
    /// Bind an engine to a connection, schema and script set
    pub fn new(store: &'a dyn Store, schema: &'a ModelSchema, scripts: &'a ScriptSet) -> Self {
        Self {
            store,
            schema,
            scripts,
        }
    }

    /// Create a record on this shard.
    ///
    /// Assigns a fresh id and, in one script invocation, writes the
    /// record hash, every affected index entry, and the model's
    /// current TTL. The caller has already picked the shard.
    pub async fn create(&self, attrs: &HashMap<String, AttrValue>) -> IndexResult<RecordId> {
        let fields = self.schema.encode_attrs(attrs)?;
        let id = RecordId::generate();
        let args = self.mutation_args(id, fields);
        self.store
            .run_script(self.scripts.handle(ScriptName::CreateRecord), &[], &args.encode())
            .await?;
        Ok(id)
    }

    /// Update fields of a record on this shard.
    ///
    /// Returns whether the record lives here; a shard that does not
    /// own the id reports a no-op. Only the given fields are touched;
    /// index migration for changed values happens inside the script.
    pub async fn update(
        &self,
        id: RecordId,
        attrs: &HashMap<String, AttrValue>,
    ) -> IndexResult<bool> {
        let fields = self.schema.encode_attrs(attrs)?;
        let args = self.mutation_args(id, fields);
        let reply = self
            .store
            .run_script(self.scripts.handle(ScriptName::UpdateRecord), &[], &args.encode())
            .await?;
        Ok(reply.as_int() == Some(1))
    }

    /// Delete a record on this shard. Idempotent; returns whether a
    /// record actually died here.
    pub async fn delete(&self, id: RecordId) -> IndexResult<bool> {
        let args = self.mutation_args(id, Vec::new());
        let reply = self
            .store
            .run_script(self.scripts.handle(ScriptName::DeleteRecord), &[], &args.encode())
            .await?;
        Ok(reply.as_int() == Some(1))
    }

    /// Fetch a record by id, or None if this shard does not hold it
    pub async fn find(&self, id: RecordId) -> IndexResult<Option<Record>> {
        let key = keys::record_key(self.schema.name(), &id);
        let fields = self.store.hgetall(&key).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(Record::from_fields(self.schema, id, &fields)?))
    }

    /// Resolve a predicate conjunction to the ids matching all of it
    /// on this shard.
    ///
    /// Candidate sets are intersected smallest-first; intersection is
    /// order-independent, so the ordering is purely a cost decision.
    pub async fn resolve(&self, predicates: &[Predicate]) -> IndexResult<Vec<RecordId>> {
        let mut candidate_sets = Vec::with_capacity(predicates.len());
        for predicate in predicates {
            candidate_sets.push(self.candidates(predicate).await?);
        }

        candidate_sets.sort_by_key(Vec::len);

        let mut sets = candidate_sets.into_iter();
        let Some(mut survivors) = sets.next() else {
            return Ok(Vec::new());
        };
        for set in sets {
            if survivors.is_empty() {
                break;
            }
            let members: HashSet<&str> = set.iter().map(String::as_str).collect();
            survivors.retain(|id| members.contains(id.as_str()));
        }

        Ok(survivors.iter().filter_map(|raw| RecordId::parse(raw)).collect())
    }

    /// Resolve predicates and fetch the surviving records.
    ///
    /// With a projection, only the projected fields are read. Ids
    /// whose record expired after being indexed are skipped; the next
    /// active TTL cycle reconciles their index entries.
    pub async fn query(
        &self,
        predicates: &[Predicate],
        projection: Option<&[String]>,
    ) -> IndexResult<Vec<Record>> {
        let ids = self.resolve(predicates).await?;
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match projection {
                None => {
                    if let Some(record) = self.find(id).await? {
                        records.push(record);
                    }
                }
                Some(fields) => {
                    if let Some(record) = self.find_projected(id, fields).await? {
                        records.push(record);
                    }
                }
            }
        }
        Ok(records)
    }

    /// Resolve predicates and count survivors without fetching
    /// record hashes.
    pub async fn count(&self, predicates: &[Predicate]) -> IndexResult<usize> {
        Ok(self.resolve(predicates).await?.len())
    }

    async fn find_projected(
        &self,
        id: RecordId,
        fields: &[String],
    ) -> IndexResult<Option<Record>> {
        let key = keys::record_key(self.schema.name(), &id);
        if !self.store.exists(&key).await? {
            return Ok(None);
        }
        let values = self.store.hmget(&key, fields).await?;
        let mut raw = HashMap::new();
        for (field, value) in fields.iter().zip(values) {
            if let Some(value) = value {
                raw.insert(field.clone(), value);
            }
        }
        Ok(Some(Record::from_fields(self.schema, id, &raw)?))
    }

    async fn candidates(&self, predicate: &Predicate) -> IndexResult<Vec<String>> {
        let model = self.schema.name();
        match predicate {
            Predicate::Eq { attr, value } => match self.schema.index_kind(attr) {
                IndexKind::Exact => {
                    let key = keys::exact_index_key(model, attr, &value.encode());
                    Ok(self.store.smembers(&key).await?)
                }
                IndexKind::Range => {
                    // Equality on a range attribute is the single-point
                    // score range.
                    match value.score() {
                        Some(score) => {
                            let key = keys::range_index_key(model, attr);
                            let bound = ScoreBound::Inclusive(score);
                            Ok(self.store.zrangebyscore(&key, bound, bound).await?)
                        }
                        None => Ok(Vec::new()),
                    }
                }
                IndexKind::None => Ok(Vec::new()),
            },
            Predicate::Range { attr, min, max } => {
                let key = keys::range_index_key(model, attr);
                Ok(self.store.zrangebyscore(&key, *min, *max).await?)
            }
        }
    }

    fn mutation_args(&self, id: RecordId, fields: Vec<(String, String)>) -> MutationArgs {
        MutationArgs {
            model: self.schema.name().to_string(),
            id: id.to_string(),
            exact_attrs: self.schema.exact_index_attributes().to_vec(),
            range_attrs: self.schema.range_index_attributes().to_vec(),
            fields,
        }
    }
}
