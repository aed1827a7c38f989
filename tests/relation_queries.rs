//! Relation query tests
//!
//! Every scenario runs against a 1-shard and a 3-shard cluster: query
//! behavior must not depend on where records landed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use carmine::cluster::{Cluster, ClusterConfig};
use carmine::model::{AttrType, AttrValue, AttributeDef, ModelSchema, Ttl};
use carmine::relation::Relation;
use carmine::store::{MemoryStore, Store};

// =============================================================================
// Helper Functions
// =============================================================================

fn test_schema() -> ModelSchema {
    ModelSchema::new(
        "rec",
        vec![
            AttributeDef::indexed("a", AttrType::Int),
            AttributeDef::indexed("b", AttrType::String),
            AttributeDef::new("c", AttrType::Int),
            AttributeDef::indexed("d", AttrType::Time),
        ],
        Ttl::None,
    )
    .unwrap()
}

async fn connect(shards: usize) -> Arc<Cluster> {
    let config = ClusterConfig::sharded(
        (0..shards).map(|_| Arc::new(MemoryStore::new()) as Arc<dyn Store>),
    );
    Arc::new(Cluster::connect(config, test_schema()).await.unwrap())
}

fn attrs(pairs: &[(&str, AttrValue)]) -> HashMap<String, AttrValue> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

// =============================================================================
// Update Moves Index Membership
// =============================================================================

async fn update_moves_index_membership(cluster: Arc<Cluster>) {
    let record = cluster
        .create(attrs(&[
            ("a", AttrValue::Int(3)),
            ("b", AttrValue::String("3".into())),
            ("c", AttrValue::Int(3)),
        ]))
        .await
        .unwrap();

    cluster
        .update(record.id(), attrs(&[("a", AttrValue::Int(4))]))
        .await
        .unwrap();

    // The previous value of a no longer matches; the new one does.
    let count = Relation::new(cluster.clone())
        .where_eq("a", 3i64)
        .unwrap()
        .count()
        .await
        .unwrap();
    assert_eq!(count, 0);

    let matched = Relation::new(cluster.clone())
        .where_eq("a", 4i64)
        .unwrap()
        .all()
        .await
        .unwrap();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].id(), record.id());

    // Untouched index attributes keep their entries.
    let matched = Relation::new(cluster)
        .where_eq("b", "3")
        .unwrap()
        .all()
        .await
        .unwrap();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].id(), record.id());
}

#[tokio::test]
async fn test_update_moves_index_membership_single_shard() {
    update_moves_index_membership(connect(1).await).await;
}

#[tokio::test]
async fn test_update_moves_index_membership_three_shards() {
    update_moves_index_membership(connect(3).await).await;
}

// =============================================================================
// Delete Clears Index Membership
// =============================================================================

async fn delete_clears_index_membership(cluster: Arc<Cluster>) {
    let record = cluster
        .create(attrs(&[
            ("a", AttrValue::Int(3)),
            ("b", AttrValue::String("3".into())),
        ]))
        .await
        .unwrap();

    cluster.delete(record.id()).await.unwrap();

    let matched = Relation::new(cluster)
        .where_eq("a", 3i64)
        .unwrap()
        .all()
        .await
        .unwrap();
    assert!(matched.is_empty());
}

#[tokio::test]
async fn test_delete_clears_index_membership_single_shard() {
    delete_clears_index_membership(connect(1).await).await;
}

#[tokio::test]
async fn test_delete_clears_index_membership_three_shards() {
    delete_clears_index_membership(connect(3).await).await;
}

// =============================================================================
// Projection
// =============================================================================

async fn select_projects_fields(cluster: Arc<Cluster>) {
    let first = cluster
        .create(attrs(&[
            ("a", AttrValue::Int(3)),
            ("b", AttrValue::String("3".into())),
            ("c", AttrValue::Int(3)),
        ]))
        .await
        .unwrap();
    cluster
        .create(attrs(&[
            ("a", AttrValue::Int(3)),
            ("b", AttrValue::String("4".into())),
            ("c", AttrValue::Int(3)),
        ]))
        .await
        .unwrap();

    let rows = Relation::new(cluster)
        .where_eq("a", 3i64)
        .unwrap()
        .where_eq("b", "3")
        .unwrap()
        .select(&["c"])
        .unwrap()
        .all()
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id(), first.id());
    assert_eq!(rows[0].get("c"), Some(&AttrValue::Int(3)));
    assert_eq!(rows[0].get("a"), None);
    assert_eq!(rows[0].get("b"), None);
}

#[tokio::test]
async fn test_select_projects_fields_single_shard() {
    select_projects_fields(connect(1).await).await;
}

#[tokio::test]
async fn test_select_projects_fields_three_shards() {
    select_projects_fields(connect(3).await).await;
}

// =============================================================================
// In-Process Filter
// =============================================================================

async fn filter_runs_after_fetch(cluster: Arc<Cluster>) {
    let first = cluster
        .create(attrs(&[
            ("a", AttrValue::Int(3)),
            ("b", AttrValue::String("3".into())),
        ]))
        .await
        .unwrap();
    cluster
        .create(attrs(&[
            ("a", AttrValue::Int(3)),
            ("b", AttrValue::String("4".into())),
        ]))
        .await
        .unwrap();

    let rows = Relation::new(cluster)
        .where_eq("a", 3i64)
        .unwrap()
        .filter(|record| record.get("b") == Some(&AttrValue::String("3".into())))
        .unwrap()
        .all()
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id(), first.id());
}

#[tokio::test]
async fn test_filter_runs_after_fetch_single_shard() {
    filter_runs_after_fetch(connect(1).await).await;
}

#[tokio::test]
async fn test_filter_runs_after_fetch_three_shards() {
    filter_runs_after_fetch(connect(3).await).await;
}

// =============================================================================
// Count
// =============================================================================

async fn count_sums_matches(cluster: Arc<Cluster>) {
    cluster
        .create(attrs(&[
            ("a", AttrValue::Int(3)),
            ("b", AttrValue::String("3".into())),
        ]))
        .await
        .unwrap();
    cluster
        .create(attrs(&[
            ("a", AttrValue::Int(3)),
            ("b", AttrValue::String("4".into())),
        ]))
        .await
        .unwrap();

    let count = Relation::new(cluster.clone())
        .where_eq("a", 3i64)
        .unwrap()
        .count()
        .await
        .unwrap();
    assert_eq!(count, 2);

    let count = Relation::new(cluster)
        .where_eq("a", 0i64)
        .unwrap()
        .count()
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_count_sums_matches_single_shard() {
    count_sums_matches(connect(1).await).await;
}

#[tokio::test]
async fn test_count_sums_matches_three_shards() {
    count_sums_matches(connect(3).await).await;
}

// =============================================================================
// Range Predicates
// =============================================================================

#[tokio::test]
async fn test_range_predicate_selects_score_window() {
    use carmine::store::ScoreBound;

    let cluster = connect(3).await;
    for value in [1i64, 5, 10, 20] {
        cluster
            .create(attrs(&[("a", AttrValue::Int(value))]))
            .await
            .unwrap();
    }

    let rows = Relation::new(cluster)
        .where_range("a", ScoreBound::Inclusive(5.0), ScoreBound::Exclusive(20.0))
        .unwrap()
        .all()
        .await
        .unwrap();

    let values: HashSet<_> = rows
        .iter()
        .map(|r| match r.get("a") {
            Some(AttrValue::Int(v)) => *v,
            other => panic!("unexpected value {:?}", other),
        })
        .collect();
    assert_eq!(values, HashSet::from([5, 10]));
}

// =============================================================================
// Cross-Shard Merge
// =============================================================================

#[tokio::test]
async fn test_merge_returns_each_record_from_exactly_one_shard() {
    let cluster = connect(3).await;

    let mut created = HashSet::new();
    for _ in 0..10 {
        let record = cluster
            .create(attrs(&[("a", AttrValue::Int(3))]))
            .await
            .unwrap();
        created.insert(record.id());
    }
    assert_eq!(created.len(), 10);

    let rows = Relation::new(cluster.clone())
        .where_eq("a", 3i64)
        .unwrap()
        .all()
        .await
        .unwrap();
    let returned: HashSet<_> = rows.iter().map(|r| r.id()).collect();
    assert_eq!(returned, created);

    // Each id is present on exactly one shard.
    for id in created {
        let mut holders = 0;
        for shard in cluster.shards() {
            if shard.find(cluster.schema(), id).await.unwrap().is_some() {
                holders += 1;
            }
        }
        assert_eq!(holders, 1, "record {} held by {} shards", id, holders);
    }
}

// =============================================================================
// First
// =============================================================================

#[tokio::test]
async fn test_first_is_deterministic_across_calls() {
    let cluster = connect(3).await;
    for _ in 0..6 {
        cluster
            .create(attrs(&[("a", AttrValue::Int(3))]))
            .await
            .unwrap();
    }

    let relation = Relation::new(cluster).where_eq("a", 3i64).unwrap();
    let first = relation.first().await.unwrap().unwrap();
    for _ in 0..3 {
        let again = relation.first().await.unwrap().unwrap();
        assert_eq!(again.id(), first.id());
    }
}

// =============================================================================
// Find By Id
// =============================================================================

#[tokio::test]
async fn test_find_locates_record_on_any_shard() {
    let cluster = connect(3).await;
    let record = cluster
        .create(attrs(&[("b", AttrValue::String("here".into()))]))
        .await
        .unwrap();

    let found = cluster.find(record.id()).await.unwrap();
    assert_eq!(found.id(), record.id());
    assert_eq!(found.get("b"), Some(&AttrValue::String("here".into())));
}
