//! carmine - a sharded secondary-indexing layer for Redis-compatible
//! key-value stores
//!
//! Gives callers document-style records with typed attributes,
//! equality and range queries, optional per-model expiration, and
//! horizontal sharding, on top of a store that only offers single-key
//! atomicity plus server-side scripting.

pub mod cluster;
pub mod index;
pub mod keys;
pub mod model;
pub mod observability;
pub mod relation;
pub mod scripts;
pub mod shard;
pub mod store;
pub mod ttl;
