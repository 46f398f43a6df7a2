//! Mounting an attached volume under the dependent service
//!
//! | # | Step | Policy |
//! |---|------|--------|
//! | 1 | stop service | best effort |
//! | 2 | unmount whatever is at the mount point | best effort |
//! | 3 | format (blank volumes only) | required |
//! | 4 | create mount point | required |
//! | 5 | mount | required |
//! | 6 | start service | required |
//! | 7 | health probe, unmount on failure | required |
//! | 8 | save volume info | required |

use crate::cache::attach::Attachment;
use crate::cache::step::Step;
use crate::cache::volume_info::{VolumeInfo, VolumeInfoStore};
use crate::error::{WarmvolError, WarmvolResult};
use crate::host::{mount, DependentService, Host};
use tracing::{info, warn};

pub mod steps {
    use crate::cache::step::Step;

    pub const STOP_SERVICE: Step = Step::best_effort("stop service");
    pub const UNMOUNT_STALE: Step = Step::best_effort("unmount stale mount");
    pub const FORMAT: Step = Step::required("format device");
    pub const CREATE_MOUNT_POINT: Step = Step::required("create mount point");
    pub const MOUNT: Step = Step::required("mount device");
    pub const START_SERVICE: Step = Step::required("start service");
    pub const HEALTH_PROBE: Step = Step::required("health probe");
    pub const SAVE_VOLUME_INFO: Step = Step::required("save volume info");
}

/// Puts an attached volume in place under the dependent service
pub struct MountOrchestrator {
    host: Host,
    service: DependentService,
    store: VolumeInfoStore,
    filesystem: String,
}

impl MountOrchestrator {
    pub fn new(
        host: Host,
        service: DependentService,
        store: VolumeInfoStore,
        filesystem: impl Into<String>,
    ) -> Self {
        Self {
            host,
            service,
            store,
            filesystem: filesystem.into(),
        }
    }

    /// Mount `attachment` at `mount_point` and record it
    pub async fn mount(
        &self,
        attachment: &Attachment,
        mount_point: &str,
        needs_format: bool,
    ) -> WarmvolResult<VolumeInfo> {
        let device = attachment.actual_device.as_str();

        steps::STOP_SERVICE.run(self.service.stop()).await?;
        steps::UNMOUNT_STALE
            .run(mount::unmount_if_mounted(&self.host, mount_point))
            .await?;

        if needs_format {
            steps::FORMAT
                .run(mount::format(&self.host, device, &self.filesystem))
                .await?;
        } else {
            info!(device, "Volume was cloned from a snapshot, not formatting");
        }

        steps::CREATE_MOUNT_POINT
            .run(mount::ensure_dir(&self.host, mount_point))
            .await?;
        steps::MOUNT
            .run(mount::mount(&self.host, device, mount_point))
            .await?;
        info!(device, mount_point, "Volume mounted");

        steps::START_SERVICE.run(self.service.start()).await?;
        steps::HEALTH_PROBE.run(self.probe(mount_point)).await?;

        let info = VolumeInfo {
            volume_id: attachment.volume_id.clone(),
            device_name: attachment.actual_device.clone(),
            mount_point: mount_point.to_string(),
        };
        steps::SAVE_VOLUME_INFO.run(self.store.save(&info)).await?;
        Ok(info)
    }

    /// Probe the service; on failure take the volume out of service
    async fn probe(&self, mount_point: &str) -> WarmvolResult<()> {
        let reason = match self.service.health_probe().await {
            Ok(Some(output)) => {
                info!("{} health probe output:\n{}", self.service.name(), output.trim_end());
                return Ok(());
            }
            Ok(None) => return Ok(()),
            Err(e) => e.to_string(),
        };

        warn!(
            mount_point,
            "Health probe failed, treating the cache as corrupt and unmounting"
        );
        self.release(mount_point).await;
        Err(WarmvolError::HealthProbe {
            service: self.service.name().to_string(),
            mount_point: mount_point.to_string(),
            reason,
        })
    }

    /// Stop the service and unmount, logging failures
    async fn release(&self, mount_point: &str) {
        const STOP: Step = Step::best_effort("stop service after failed probe");
        const UNMOUNT: Step = Step::best_effort("unmount after failed probe");

        // Best-effort steps never return Err
        let _ = STOP.run(self.service.stop()).await;
        let _ = UNMOUNT.run(mount::unmount(&self.host, mount_point)).await;
    }
}
