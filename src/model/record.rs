//! Record representation
//!
//! A record is an id plus a typed attribute map. The id is assigned at
//! creation and never reassigned; a record lives on exactly one shard
//! for its whole lifetime.

use std::collections::HashMap;
use std::fmt;

use uuid::Uuid;

use super::descriptor::ModelSchema;
use super::errors::ModelResult;
use super::types::AttrValue;

/// Record identifier.
///
/// Random UUIDs keep ids unique within a shard (the required
/// invariant) and distinct across shards in practice, so cross-shard
/// result merges are plain unions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generate a fresh id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an id from its key segment form
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(Self)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A materialized record: id plus attribute values.
///
/// Projected reads produce partial records; attributes outside the
/// projection are absent, not defaulted.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: RecordId,
    attributes: HashMap<String, AttrValue>,
}

impl Record {
    /// Build a record from decoded attributes
    pub fn new(id: RecordId, attributes: HashMap<String, AttrValue>) -> Self {
        Self { id, attributes }
    }

    /// Decode a stored hash into a record using the model declaration
    pub fn from_fields(
        schema: &ModelSchema,
        id: RecordId,
        fields: &HashMap<String, String>,
    ) -> ModelResult<Self> {
        Ok(Self {
            id,
            attributes: schema.decode_attrs(fields)?,
        })
    }

    /// Record id
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Attribute value, if set (and inside the projection, for
    /// projected reads)
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    /// All present attributes
    pub fn attributes(&self) -> &HashMap<String, AttrValue> {
        &self.attributes
    }
}
