//! TTL policy tests
//!
//! Passive changes only rewrite the per-shard metadata; records keep
//! their old expiration until their next write. Active changes walk
//! every record key and re-apply the new TTL immediately.

use std::collections::HashMap;
use std::sync::Arc;

use carmine::cluster::{Cluster, ClusterConfig};
use carmine::model::{AttrType, AttrValue, AttributeDef, ModelSchema, Record, Ttl};
use carmine::store::{MemoryStore, Store};
use carmine::ttl::{change_ttl_active, change_ttl_passive};

// =============================================================================
// Helper Functions
// =============================================================================

fn test_schema(ttl: Ttl) -> ModelSchema {
    ModelSchema::new(
        "session",
        vec![AttributeDef::indexed("user", AttrType::String)],
        ttl,
    )
    .unwrap()
}

async fn connect(shards: usize, ttl: Ttl) -> Arc<Cluster> {
    let config = ClusterConfig::sharded(
        (0..shards).map(|_| Arc::new(MemoryStore::new()) as Arc<dyn Store>),
    );
    Arc::new(Cluster::connect(config, test_schema(ttl)).await.unwrap())
}

fn attrs(user: &str) -> HashMap<String, AttrValue> {
    let mut map = HashMap::new();
    map.insert("user".to_string(), AttrValue::String(user.to_string()));
    map
}

/// Remaining TTL of a record's key, asked of the shard that holds it
async fn record_ttl(cluster: &Arc<Cluster>, record: &Record) -> i64 {
    let key = format!("session:id:{}", record.id());
    for shard in cluster.shards() {
        let remaining = shard.store().ttl(&key).await.unwrap();
        if remaining != -2 {
            return remaining;
        }
    }
    panic!("record {} not found on any shard", record.id());
}

fn assert_close_to(remaining: i64, seconds: i64) {
    assert!(
        remaining > seconds - 10 && remaining <= seconds,
        "ttl {} not close to {}",
        remaining,
        seconds
    );
}

// =============================================================================
// Declared TTL
// =============================================================================

#[tokio::test]
async fn test_declared_ttl_applies_from_first_write() {
    let cluster = connect(3, Ttl::Seconds(7200)).await;
    let record = cluster.create(attrs("ada")).await.unwrap();
    assert_close_to(record_ttl(&cluster, &record).await, 7200);
}

// =============================================================================
// Passive Changes
// =============================================================================

#[tokio::test]
async fn test_passive_change_spares_existing_records() {
    let cluster = connect(3, Ttl::None).await;
    let existing: Vec<Record> = {
        let mut records = Vec::new();
        for i in 0..6 {
            records.push(cluster.create(attrs(&format!("u{}", i))).await.unwrap());
        }
        records
    };

    change_ttl_passive(&cluster, Ttl::Seconds(7200)).await.unwrap();

    // Metadata moved on every shard...
    for shard in cluster.shards() {
        let raw = shard.store().get("session:ttl").await.unwrap();
        assert_eq!(raw.as_deref(), Some("7200"));
    }
    // ...but existing records keep no expiration until rewritten.
    for record in &existing {
        assert_eq!(record_ttl(&cluster, record).await, -1);
    }

    // A write picks up the new TTL for that record only.
    cluster
        .update(existing[0].id(), attrs("renamed"))
        .await
        .unwrap();
    assert_close_to(record_ttl(&cluster, &existing[0]).await, 7200);
    assert_eq!(record_ttl(&cluster, &existing[1]).await, -1);

    // New records expire from creation.
    let fresh = cluster.create(attrs("fresh")).await.unwrap();
    assert_close_to(record_ttl(&cluster, &fresh).await, 7200);
}

// =============================================================================
// Active Changes
// =============================================================================

#[tokio::test]
async fn test_active_change_reaches_every_existing_record() {
    let cluster = connect(3, Ttl::None).await;
    let mut existing = Vec::new();
    for i in 0..10 {
        existing.push(cluster.create(attrs(&format!("u{}", i))).await.unwrap());
    }

    change_ttl_active(&cluster, Ttl::Seconds(7200)).await.unwrap();

    for record in &existing {
        assert_close_to(record_ttl(&cluster, record).await, 7200);
    }
}

#[tokio::test]
async fn test_active_change_to_none_clears_expirations() {
    let cluster = connect(2, Ttl::Seconds(3600)).await;
    let record = cluster.create(attrs("ada")).await.unwrap();
    assert_close_to(record_ttl(&cluster, &record).await, 3600);

    change_ttl_active(&cluster, Ttl::None).await.unwrap();

    assert_eq!(record_ttl(&cluster, &record).await, -1);

    // And the sentinel holds for later writes too.
    cluster.update(record.id(), attrs("renamed")).await.unwrap();
    assert_eq!(record_ttl(&cluster, &record).await, -1);
}

#[tokio::test]
async fn test_active_change_skips_keys_deleted_mid_migration() {
    let cluster = connect(1, Ttl::None).await;
    let kept = cluster.create(attrs("kept")).await.unwrap();
    let dropped = cluster.create(attrs("dropped")).await.unwrap();

    // Delete one record; the migration's scan must tolerate the gap.
    cluster.delete(dropped.id()).await.unwrap();
    change_ttl_active(&cluster, Ttl::Seconds(60)).await.unwrap();

    assert_close_to(record_ttl(&cluster, &kept).await, 60);
}
