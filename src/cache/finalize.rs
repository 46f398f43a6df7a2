//! Folding a job's volume back into a snapshot
//!
//! | Step | Policy |
//! |------|--------|
//! | load volume info | required |
//! | prune service data | best effort |
//! | stop service | best effort |
//! | unmount | required, unless the mount table shows it gone |
//! | detach and wait for available | required |
//! | create snapshot | required |
//! | wait for completion (optional) | required |
//! | delete source volume | best effort, also after a failed wait |

use crate::cache::attach::AttachmentManager;
use crate::cache::key::{CacheKey, ResourceNames};
use crate::cache::volume_info::VolumeInfoStore;
use crate::cloud::{wait, BlockStorage, PollPolicy, Snapshot};
use crate::error::WarmvolResult;
use crate::host::{mount, DependentService, Host};
use std::sync::Arc;
use tracing::{info, warn};

pub mod steps {
    use crate::cache::step::Step;

    pub const LOAD_VOLUME_INFO: Step = Step::required("load volume info");
    pub const PRUNE: Step = Step::best_effort("prune service data");
    pub const STOP_SERVICE: Step = Step::best_effort("stop service");
    pub const UNMOUNT: Step = Step::required("unmount");
    pub const DETACH: Step = Step::required("detach volume");
    pub const CREATE_SNAPSHOT: Step = Step::required("create snapshot");
    pub const WAIT_SNAPSHOT: Step = Step::required("wait for snapshot");
    pub const DELETE_VOLUME: Step = Step::best_effort("delete source volume");
}

/// Snapshots and releases the volume bound to a mount point
pub struct SnapshotFinalizer {
    host: Host,
    service: DependentService,
    storage: Arc<dyn BlockStorage>,
    attacher: Arc<AttachmentManager>,
    store: VolumeInfoStore,
    snapshot_policy: PollPolicy,
    wait_for_completion: bool,
}

impl SnapshotFinalizer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        host: Host,
        service: DependentService,
        storage: Arc<dyn BlockStorage>,
        attacher: Arc<AttachmentManager>,
        store: VolumeInfoStore,
        snapshot_policy: PollPolicy,
        wait_for_completion: bool,
    ) -> Self {
        Self {
            host,
            service,
            storage,
            attacher,
            store,
            snapshot_policy,
            wait_for_completion,
        }
    }

    /// Snapshot the volume mounted at `mount_point` under `key`
    pub async fn finalize(
        &self,
        mount_point: &str,
        key: &CacheKey,
        names: &ResourceNames,
    ) -> WarmvolResult<Snapshot> {
        let record = steps::LOAD_VOLUME_INFO
            .output(self.store.load(mount_point))
            .await?;
        let volume_id = record.volume_id.as_str();
        info!(volume_id, mount_point, device = %record.device_name, "Finalizing cache volume");

        steps::PRUNE.run(self.service.prune()).await?;
        steps::STOP_SERVICE.run(self.service.stop()).await?;
        steps::UNMOUNT.run(self.unmount(mount_point)).await?;
        steps::DETACH.run(self.attacher.detach(volume_id)).await?;

        let snapshot = steps::CREATE_SNAPSHOT
            .output(self.storage.create_snapshot(
                volume_id,
                &names.description,
                &key.tags_with_name(&names.snapshot),
            ))
            .await?;
        info!(snapshot_id = %snapshot.id, volume_id, "Snapshot {} started", names.snapshot);

        let snapshot = if self.wait_for_completion {
            let waited = steps::WAIT_SNAPSHOT
                .output(wait::snapshot_completed(
                    self.storage.as_ref(),
                    &snapshot.id,
                    self.snapshot_policy,
                ))
                .await;
            match waited {
                Ok(completed) => completed,
                Err(e) => {
                    // Nothing refers to the detached volume any more
                    warn!(snapshot_id = %snapshot.id, volume_id, "Snapshot did not complete: {}", e);
                    self.delete_source(volume_id).await;
                    return Err(e);
                }
            }
        } else {
            info!(snapshot_id = %snapshot.id, "Not waiting for snapshot completion");
            snapshot
        };

        self.delete_source(volume_id).await;
        Ok(snapshot)
    }

    async fn delete_source(&self, volume_id: &str) {
        // Best-effort steps never return Err
        let deleted = steps::DELETE_VOLUME
            .run(self.storage.delete_volume(volume_id))
            .await
            .unwrap_or(None);
        match deleted {
            Some(()) => info!(volume_id, "Source volume deleted"),
            None => warn!(volume_id, "Source volume was not deleted and needs manual cleanup"),
        }
    }

    /// Unmount, failing only if the mount point is confirmed still mounted
    async fn unmount(&self, mount_point: &str) -> WarmvolResult<()> {
        let Err(e) = mount::unmount(&self.host, mount_point).await else {
            return Ok(());
        };

        match mount::is_mounted(&self.host, mount_point).await {
            Ok(true) => Err(e),
            Ok(false) => {
                warn!(mount_point, "Unmount failed but nothing is mounted there: {}", e);
                Ok(())
            }
            Err(check) => {
                warn!(
                    mount_point,
                    "Unmount failed ({}) and the mount table could not be read ({}), continuing",
                    e,
                    check
                );
                Ok(())
            }
        }
    }
}
