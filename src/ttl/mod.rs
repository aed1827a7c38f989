//! Expiration policy
//!
//! A model's TTL lives in one metadata string per shard, read by the
//! create/update programs to decide the expiration attached to each
//! record key.
//!
//! Two migration modes:
//!
//! - **Passive**: rewrite the metadata only. Existing records keep
//!   their old expiration until their next write. This is the default,
//!   cheap path.
//! - **Active**: passive, then walk every record key of the model with
//!   a cursor scan and re-apply the new TTL immediately. O(live
//!   records); administrative use only, never on the write path.

use crate::cluster::{Cluster, ClusterResult};
use crate::index::IndexError;
use crate::keys;
use crate::model::Ttl;
use crate::observability::{Logger, Severity};
use crate::store::Store;

/// Keys fetched per scan cursor step during an active migration
const SCAN_BATCH: usize = 100;

/// Change the model's TTL metadata on every shard.
///
/// Only affects records written after the change.
pub async fn change_ttl_passive(cluster: &Cluster, ttl: Ttl) -> ClusterResult<()> {
    cluster
        .fan_out("ttl_passive", move |shard, schema| async move {
            shard
                .store()
                .set(&keys::ttl_key(schema.name()), &ttl.encode())
                .await?;
            Ok::<_, IndexError>(())
        })
        .await?;
    Ok(())
}

/// Change the model's TTL metadata and immediately re-apply it to
/// every existing record key on every shard.
///
/// The scan tolerates keys expiring or being deleted concurrently;
/// such keys are skipped without error. The no-expiration sentinel
/// clears existing expirations rather than setting one.
pub async fn change_ttl_active(cluster: &Cluster, ttl: Ttl) -> ClusterResult<()> {
    change_ttl_passive(cluster, ttl).await?;

    cluster
        .fan_out("ttl_active", move |shard, schema| async move {
            let pattern = keys::record_key_pattern(schema.name());
            let mut cursor = 0u64;
            let mut touched = 0usize;
            loop {
                let (next, batch) = shard.store().scan(cursor, &pattern, SCAN_BATCH).await?;
                for key in batch {
                    // A key that died between the scan step and here
                    // reports false; skip it.
                    let applied = match ttl {
                        Ttl::Seconds(seconds) => shard.store().expire(&key, seconds).await?,
                        Ttl::None => shard.store().persist(&key).await?,
                    };
                    if applied {
                        touched += 1;
                    }
                }
                if next == 0 {
                    break;
                }
                cursor = next;
            }

            Logger::log(
                Severity::Info,
                "ttl_migration_applied",
                &[
                    ("model", schema.name()),
                    ("records", &touched.to_string()),
                    ("shard", &shard.ordinal().to_string()),
                ],
            );
            Ok::<_, IndexError>(())
        })
        .await?;
    Ok(())
}
