//! Key construction and parsing
//!
//! All store keys for a model live under its name as a prefix. The
//! layout is a wire contract shared with every other implementation:
//!
//! ```text
//! <model>:id:<id>              record hash
//! <model>:index:<attr>:<value> exact index set
//! <model>:index:<attr>         range index sorted set
//! <model>:ttl                  TTL metadata string
//! ```
//!
//! Pure functions, no state.

use crate::model::RecordId;

/// Key of the record hash for one id
pub fn record_key(model: &str, id: &RecordId) -> String {
    record_key_raw(model, &id.to_string())
}

/// Key of the record hash for an id still in its encoded form, as the
/// script layer sees it
pub fn record_key_raw(model: &str, id: &str) -> String {
    format!("{}:id:{}", model, id)
}

/// Scan pattern matching every record key of a model
pub fn record_key_pattern(model: &str) -> String {
    format!("{}:id:*", model)
}

/// Key of the exact index set for one (attribute, encoded value) pair
pub fn exact_index_key(model: &str, attr: &str, encoded_value: &str) -> String {
    format!("{}:index:{}:{}", model, attr, encoded_value)
}

/// Key of the range index sorted set for one attribute
pub fn range_index_key(model: &str, attr: &str) -> String {
    format!("{}:index:{}", model, attr)
}

/// Key of the TTL metadata string
pub fn ttl_key(model: &str) -> String {
    format!("{}:ttl", model)
}

/// Extracts the record id from a record key, if the key belongs to the
/// given model.
pub fn id_from_record_key(model: &str, key: &str) -> Option<RecordId> {
    let suffix = key.strip_prefix(model)?.strip_prefix(":id:")?;
    RecordId::parse(suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let id = RecordId::generate();
        assert_eq!(record_key("player", &id), format!("player:id:{}", id));
        assert_eq!(record_key_pattern("player"), "player:id:*");
        assert_eq!(exact_index_key("player", "name", "ada"), "player:index:name:ada");
        assert_eq!(range_index_key("player", "score"), "player:index:score");
        assert_eq!(ttl_key("player"), "player:ttl");
    }

    #[test]
    fn test_id_round_trips_through_key() {
        let id = RecordId::generate();
        let key = record_key("player", &id);
        assert_eq!(id_from_record_key("player", &key), Some(id));
    }

    #[test]
    fn test_id_from_foreign_key_is_none() {
        let id = RecordId::generate();
        let key = record_key("player", &id);
        assert_eq!(id_from_record_key("monster", &key), None);
        assert_eq!(id_from_record_key("player", "player:ttl"), None);
        assert_eq!(id_from_record_key("player", "player:id:bogus"), None);
    }
}
