//! Model declarations: typed attributes, index classification, records
//!
//! This module consumes the output of the attribute declaration layer:
//! an ordered attribute list with types and index markers, plus an
//! optional TTL. Classification into exact and range index tables is
//! resolved once, at registration time.

pub mod descriptor;
pub mod errors;
pub mod record;
pub mod types;

pub use descriptor::{AttributeDef, ModelSchema, Ttl};
pub use errors::{ModelError, ModelResult};
pub use record::{Record, RecordId};
pub use types::{AttrType, AttrValue, IndexKind};
