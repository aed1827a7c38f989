//! Cluster configuration
//!
//! An ordered list of store connections, one per shard. The list is
//! immutable for the life of the cluster built from it; reconfiguring
//! (tests swap in fresh stores this way) means building a new config
//! and a new cluster, never editing one in place.

use std::sync::Arc;

use crate::store::Store;

/// Ordered shard connection list
#[derive(Clone)]
pub struct ClusterConfig {
    stores: Vec<Arc<dyn Store>>,
}

impl ClusterConfig {
    /// Configuration for a single store instance
    pub fn single(store: Arc<dyn Store>) -> Self {
        Self {
            stores: vec![store],
        }
    }

    /// Configuration for an explicit ordered list of store instances
    pub fn sharded(stores: impl IntoIterator<Item = Arc<dyn Store>>) -> Self {
        Self {
            stores: stores.into_iter().collect(),
        }
    }

    /// The configured connections, in shard order
    pub fn stores(&self) -> &[Arc<dyn Store>] {
        &self.stores
    }

    /// Number of shards
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// Whether no shard is configured
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    pub(crate) fn into_stores(self) -> Vec<Arc<dyn Store>> {
        self.stores
    }
}

impl std::fmt::Debug for ClusterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterConfig")
            .field("shards", &self.stores.len())
            .finish()
    }
}
