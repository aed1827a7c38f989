//! Model schema and attribute descriptors
//!
//! A `ModelSchema` is the consumed output of the attribute declaration
//! layer: an ordered list of attribute definitions plus an optional
//! time-to-live. Index classification is resolved once here, at model
//! registration time, into two fixed attribute lists; nothing inspects
//! value types at query time.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::errors::{ModelError, ModelResult};
use super::types::{AttrType, AttrValue, IndexKind};

/// Time-to-live declared on a model.
///
/// `Ttl::None` encodes as the `-1` sentinel; applying it clears any
/// existing expiration instead of setting a negative duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ttl {
    /// Records never expire
    None,
    /// Records expire this many seconds after their last write
    Seconds(u64),
}

impl Ttl {
    /// Encodes the TTL for the `<model>:ttl` metadata key
    pub fn encode(&self) -> String {
        match self {
            Ttl::None => "-1".to_string(),
            Ttl::Seconds(s) => s.to_string(),
        }
    }

    /// Decodes a TTL metadata value; anything non-positive means no
    /// expiration.
    pub fn decode(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(s) if s > 0 => Ttl::Seconds(s as u64),
            _ => Ttl::None,
        }
    }
}

/// One declared attribute: name, type, and whether it is indexed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDef {
    /// Attribute name
    pub name: String,
    /// Declared value type
    pub attr_type: AttrType,
    /// Whether the attribute participates in an index
    pub indexed: bool,
}

impl AttributeDef {
    /// Create an unindexed attribute definition
    pub fn new(name: impl Into<String>, attr_type: AttrType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            indexed: false,
        }
    }

    /// Create an indexed attribute definition
    pub fn indexed(name: impl Into<String>, attr_type: AttrType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            indexed: true,
        }
    }

    /// Returns the resolved index class for this attribute
    pub fn index_kind(&self) -> IndexKind {
        if self.indexed {
            self.attr_type.index_kind()
        } else {
            IndexKind::None
        }
    }
}

/// A registered model: name, attributes, resolved index tables, TTL.
///
/// Immutable after construction. TTL or shard-set changes are made by
/// building a new configuration value, never by mutating this one.
#[derive(Debug, Clone)]
pub struct ModelSchema {
    name: String,
    attributes: Vec<AttributeDef>,
    by_name: HashMap<String, usize>,
    exact_attrs: Vec<String>,
    range_attrs: Vec<String>,
    ttl: Ttl,
}

impl ModelSchema {
    /// Resolve a declared attribute list into a schema.
    ///
    /// Classification happens here, once: each indexed attribute lands
    /// in either the exact or the range table according to its type.
    pub fn new(
        name: impl Into<String>,
        attributes: Vec<AttributeDef>,
        ttl: Ttl,
    ) -> ModelResult<Self> {
        let mut by_name = HashMap::new();
        let mut exact_attrs = Vec::new();
        let mut range_attrs = Vec::new();

        for (position, def) in attributes.iter().enumerate() {
            if by_name.insert(def.name.clone(), position).is_some() {
                return Err(ModelError::DuplicateAttribute {
                    attribute: def.name.clone(),
                });
            }
            match def.index_kind() {
                IndexKind::Exact => exact_attrs.push(def.name.clone()),
                IndexKind::Range => range_attrs.push(def.name.clone()),
                IndexKind::None => {}
            }
        }

        Ok(Self {
            name: name.into(),
            attributes,
            by_name,
            exact_attrs,
            range_attrs,
            ttl,
        })
    }

    /// Model name, used as the key namespace
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared attributes in declaration order
    pub fn attributes(&self) -> &[AttributeDef] {
        &self.attributes
    }

    /// Looks up a declared attribute by name
    pub fn attribute(&self, name: &str) -> Option<&AttributeDef> {
        self.by_name.get(name).map(|&i| &self.attributes[i])
    }

    /// Resolved index class for an attribute; unknown names are `None`
    pub fn index_kind(&self, name: &str) -> IndexKind {
        self.attribute(name).map_or(IndexKind::None, AttributeDef::index_kind)
    }

    /// Exact-indexed attribute names, in declaration order
    pub fn exact_index_attributes(&self) -> &[String] {
        &self.exact_attrs
    }

    /// Range-indexed attribute names, in declaration order
    pub fn range_index_attributes(&self) -> &[String] {
        &self.range_attrs
    }

    /// Declared time-to-live
    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    /// Validates an attribute map against the declaration and encodes
    /// it into hash fields, in declaration order.
    ///
    /// Unset optional attributes are simply absent. Unknown names and
    /// type mismatches are rejected.
    pub fn encode_attrs(
        &self,
        attrs: &HashMap<String, AttrValue>,
    ) -> ModelResult<Vec<(String, String)>> {
        for (name, value) in attrs {
            let def = self.attribute(name).ok_or_else(|| ModelError::UnknownAttribute {
                model: self.name.clone(),
                attribute: name.clone(),
            })?;
            if value.attr_type() != def.attr_type {
                return Err(ModelError::type_mismatch(
                    name.clone(),
                    def.attr_type,
                    value.attr_type(),
                ));
            }
        }

        // Declaration order keeps the encoded field list deterministic.
        Ok(self
            .attributes
            .iter()
            .filter_map(|def| {
                attrs
                    .get(&def.name)
                    .map(|v| (def.name.clone(), v.encode()))
            })
            .collect())
    }

    /// Decodes a stored hash back into typed attribute values.
    ///
    /// Fields without a matching declaration are ignored; they can
    /// appear after an attribute is dropped from the model.
    pub fn decode_attrs(
        &self,
        fields: &HashMap<String, String>,
    ) -> ModelResult<HashMap<String, AttrValue>> {
        let mut attrs = HashMap::with_capacity(fields.len());
        for (name, raw) in fields {
            if let Some(def) = self.attribute(name) {
                attrs.insert(name.clone(), AttrValue::decode(def.attr_type, raw)?);
            }
        }
        Ok(attrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> ModelSchema {
        ModelSchema::new(
            "player",
            vec![
                AttributeDef::indexed("alive", AttrType::Bool),
                AttributeDef::indexed("name", AttrType::String),
                AttributeDef::indexed("tier", AttrType::Enum),
                AttributeDef::indexed("score", AttrType::Int),
                AttributeDef::indexed("ratio", AttrType::Float),
                AttributeDef::indexed("seen_at", AttrType::Time),
                AttributeDef::new("notes", AttrType::String),
            ],
            Ttl::None,
        )
        .unwrap()
    }

    #[test]
    fn test_classification_tables() {
        let schema = sample_schema();
        assert_eq!(schema.exact_index_attributes(), ["alive", "name", "tier"]);
        assert_eq!(schema.range_index_attributes(), ["score", "ratio", "seen_at"]);
        assert_eq!(schema.index_kind("notes"), IndexKind::None);
        assert_eq!(schema.index_kind("missing"), IndexKind::None);
    }

    #[test]
    fn test_duplicate_attribute_rejected() {
        let result = ModelSchema::new(
            "m",
            vec![
                AttributeDef::new("a", AttrType::Int),
                AttributeDef::new("a", AttrType::String),
            ],
            Ttl::None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_encode_attrs_validates_names_and_types() {
        let schema = sample_schema();

        let mut unknown = HashMap::new();
        unknown.insert("nope".to_string(), AttrValue::Int(1));
        assert!(schema.encode_attrs(&unknown).is_err());

        let mut mismatched = HashMap::new();
        mismatched.insert("score".to_string(), AttrValue::String("high".into()));
        assert!(schema.encode_attrs(&mismatched).is_err());
    }

    #[test]
    fn test_encode_attrs_declaration_order() {
        let schema = sample_schema();
        let mut attrs = HashMap::new();
        attrs.insert("score".to_string(), AttrValue::Int(10));
        attrs.insert("alive".to_string(), AttrValue::Bool(true));

        let fields = schema.encode_attrs(&attrs).unwrap();
        assert_eq!(
            fields,
            vec![
                ("alive".to_string(), "true".to_string()),
                ("score".to_string(), "10".to_string()),
            ]
        );
    }

    #[test]
    fn test_ttl_encoding() {
        assert_eq!(Ttl::None.encode(), "-1");
        assert_eq!(Ttl::Seconds(7200).encode(), "7200");
        assert_eq!(Ttl::decode("7200"), Ttl::Seconds(7200));
        assert_eq!(Ttl::decode("-1"), Ttl::None);
        assert_eq!(Ttl::decode("garbage"), Ttl::None);
    }
}
