//! Snapshot lookup by cache key

use crate::cache::key::CacheKey;
use crate::cloud::{BlockStorage, Snapshot, SnapshotState};
use crate::error::WarmvolResult;
use std::sync::Arc;
use tracing::{debug, info};

/// Snapshot chosen for a restore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub snapshot: Snapshot,
    /// Found under the default branch's key rather than the job's own
    pub from_default_branch: bool,
}

/// Finds the newest usable snapshot of a cache lineage
pub struct SnapshotLocator {
    storage: Arc<dyn BlockStorage>,
    min_size_gib: u32,
}

impl SnapshotLocator {
    /// Snapshots of volumes smaller than `min_size_gib` are never returned
    pub fn new(storage: Arc<dyn BlockStorage>, min_size_gib: u32) -> Self {
        Self {
            storage,
            min_size_gib,
        }
    }

    /// Latest usable snapshot for `key`, else for `default_key`.
    ///
    /// `None` means a blank volume should be provisioned.
    pub async fn locate(
        &self,
        key: &CacheKey,
        default_key: Option<&CacheKey>,
    ) -> WarmvolResult<Option<Located>> {
        if let Some(snapshot) = self.latest(key).await? {
            return Ok(Some(Located {
                snapshot,
                from_default_branch: false,
            }));
        }

        let Some(default_key) = default_key.filter(|d| *d != key) else {
            info!(branch = %key.branch_ref, "No snapshot found and no default branch to fall back to");
            return Ok(None);
        };

        info!(
            "No snapshot for {}, trying default branch {}",
            key.branch_ref, default_key.branch_ref
        );
        let located = self.latest(default_key).await?.map(|snapshot| Located {
            snapshot,
            from_default_branch: true,
        });
        if located.is_none() {
            info!(branch = %default_key.branch_ref, "No snapshot for default branch either");
        }
        Ok(located)
    }

    async fn latest(&self, key: &CacheKey) -> WarmvolResult<Option<Snapshot>> {
        let found = self.storage.find_snapshots(&key.completed_filter()).await?;
        let total = found.len();
        let candidates: Vec<Snapshot> = found
            .into_iter()
            .filter(|s| key.matches(&s.tags))
            .collect();
        debug!(
            "{} snapshot(s) tagged {}, {} with exactly the key's tags",
            total,
            key.branch_tag(),
            candidates.len()
        );

        let latest = select_latest(candidates, self.min_size_gib);
        if let Some(snapshot) = &latest {
            info!(
                snapshot_id = %snapshot.id,
                size_gib = snapshot.volume_size_gib,
                started = %snapshot.start_time,
                "Found snapshot for {}",
                key.branch_ref
            );
        }
        Ok(latest)
    }
}

/// Newest completed snapshot of at least `min_size_gib`; ties go to the highest id
pub fn select_latest(snapshots: Vec<Snapshot>, min_size_gib: u32) -> Option<Snapshot> {
    snapshots
        .into_iter()
        .filter(|s| s.state == SnapshotState::Completed)
        .filter(|s| {
            let usable = s.volume_size_gib >= min_size_gib;
            if !usable {
                debug!(
                    "Ignoring snapshot {} of {} GiB, below minimum {} GiB",
                    s.id, s.volume_size_gib, min_size_gib
                );
            }
            usable
        })
        .max_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.id.cmp(&b.id))
        })
}
