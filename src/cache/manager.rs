//! Restore and snapshot entry points for one job

use crate::cache::attach::AttachmentManager;
use crate::cache::finalize::SnapshotFinalizer;
use crate::cache::key::{CacheKey, ResourceNames};
use crate::cache::locator::{Located, SnapshotLocator};
use crate::cache::mount::MountOrchestrator;
use crate::cache::provisioner::VolumeProvisioner;
use crate::cache::volume_info::{VolumeInfo, VolumeInfoStore};
use crate::cloud::BlockStorage;
use crate::config::{Config, ConfigManager, JobContext};
use crate::error::WarmvolResult;
use crate::host::{mount, DependentService, DeviceResolver, Host};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of a restore
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreOutput {
    pub volume_id: String,
    pub device_name: String,
    /// Snapshot the volume was cloned from, if any
    pub snapshot_id: Option<String>,
}

/// Result of a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotOutput {
    pub snapshot_id: String,
}

/// Compensating steps for a volume that never made it into service
mod cleanup {
    use crate::cache::step::Step;

    pub const UNMOUNT: Step = Step::best_effort("unmount failed volume");
    pub const DETACH: Step = Step::best_effort("detach failed volume");
    pub const DELETE: Step = Step::best_effort("delete failed volume");
    pub const START_SERVICE: Step = Step::best_effort("start service without cache");
}

/// Per-branch volume cache of one job
pub struct VolumeCacheManager {
    job: JobContext,
    key: CacheKey,
    default_key: Option<CacheKey>,
    names: ResourceNames,
    requested_device: String,
    host: Host,
    service: DependentService,
    storage: Arc<dyn BlockStorage>,
    locator: SnapshotLocator,
    provisioner: VolumeProvisioner,
    attacher: Arc<AttachmentManager>,
    orchestrator: MountOrchestrator,
    finalizer: SnapshotFinalizer,
}

impl VolumeCacheManager {
    /// Build the pipeline for `job`; fails before any cloud call if the job is incomplete
    pub fn new(
        config: &Config,
        job: JobContext,
        host: Host,
        storage: Arc<dyn BlockStorage>,
        resolver: Arc<dyn DeviceResolver>,
    ) -> WarmvolResult<Self> {
        job.validate()?;

        let format_version = &config.snapshot.format_version;
        let key = CacheKey::for_job(&job, format_version);
        let default_key = CacheKey::for_default_branch(&job, format_version);
        let names = ResourceNames::new(&config.snapshot.name_prefix, &key, Utc::now());

        let store = VolumeInfoStore::new(ConfigManager::state_dir(config));
        let service = DependentService::new(host.clone(), config.service.clone());
        let attacher = Arc::new(AttachmentManager::new(
            storage.clone(),
            resolver,
            job.instance_id.clone(),
            config.timeouts.clone(),
        ));

        Ok(Self {
            locator: SnapshotLocator::new(storage.clone(), config.volume.min_size_gib),
            provisioner: VolumeProvisioner::new(storage.clone(), config.volume.clone()),
            orchestrator: MountOrchestrator::new(
                host.clone(),
                service.clone(),
                store.clone(),
                config.volume.filesystem.clone(),
            ),
            finalizer: SnapshotFinalizer::new(
                host.clone(),
                service.clone(),
                storage.clone(),
                attacher.clone(),
                store,
                config.timeouts.snapshot_completed(),
                config.snapshot.wait_for_completion,
            ),
            attacher,
            requested_device: config.volume.device.clone(),
            host,
            service,
            storage,
            job,
            key,
            default_key,
            names,
        })
    }

    /// Attach under `device` instead of `volume.device`.
    ///
    /// Each mount point of one job needs its own device name.
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.requested_device = device.into();
        self
    }

    /// Cache key of the job's branch
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Key of the default branch used as fallback, if any
    pub fn default_key(&self) -> Option<&CacheKey> {
        self.default_key.as_ref()
    }

    /// Snapshot the next restore would clone
    pub async fn locate(&self) -> WarmvolResult<Option<Located>> {
        self.locator
            .locate(&self.key, self.default_key.as_ref())
            .await
    }

    /// Provision, attach and mount a cache volume at `mount_point`
    pub async fn restore(&self, mount_point: &str) -> WarmvolResult<RestoreOutput> {
        info!(
            mount_point,
            branch = %self.key.branch_ref,
            repository = %self.key.repository,
            "Restoring cache volume via {}",
            self.storage.backend_name()
        );

        let located = self.locate().await.inspect_err(|e| {
            error!(mount_point, "Snapshot lookup failed: {}", e);
        })?;
        let snapshot = located.as_ref().map(|l| &l.snapshot);
        if let Some(l) = &located {
            if l.from_default_branch {
                info!(snapshot_id = %l.snapshot.id, "Using the default branch's snapshot");
            }
        }

        let provisioned = self
            .provisioner
            .provision(
                snapshot,
                &self.job.availability_zone,
                &self.key,
                &self.names.volume,
            )
            .await
            .inspect_err(|e| error!(mount_point, "Volume creation failed: {}", e))?;
        let volume_id = provisioned.volume.id.clone();

        match self
            .bring_online(&volume_id, mount_point, provisioned.needs_format)
            .await
        {
            Ok(record) => {
                info!(
                    volume_id = %record.volume_id,
                    device = %record.device_name,
                    mount_point,
                    "Cache volume ready"
                );
                Ok(RestoreOutput {
                    volume_id: record.volume_id,
                    device_name: record.device_name,
                    snapshot_id: snapshot.map(|s| s.id.clone()),
                })
            }
            Err(e) => {
                error!(volume_id = %volume_id, mount_point, "Restore failed: {}", e);
                self.discard(&volume_id, mount_point).await;
                Err(e)
            }
        }
    }

    /// Snapshot the volume at `mount_point` and release it
    pub async fn snapshot(&self, mount_point: &str) -> WarmvolResult<SnapshotOutput> {
        info!(mount_point, branch = %self.key.branch_ref, "Snapshotting cache volume");

        let snapshot = self
            .finalizer
            .finalize(mount_point, &self.key, &self.names)
            .await
            .inspect_err(|e| error!(mount_point, "Snapshot failed: {}", e))?;

        Ok(SnapshotOutput {
            snapshot_id: snapshot.id,
        })
    }

    async fn bring_online(
        &self,
        volume_id: &str,
        mount_point: &str,
        needs_format: bool,
    ) -> WarmvolResult<VolumeInfo> {
        let attachment = self
            .attacher
            .attach(volume_id, &self.requested_device)
            .await?;
        self.orchestrator
            .mount(&attachment, mount_point, needs_format)
            .await
    }

    /// Remove a volume created by a failed restore; failures are only logged
    async fn discard(&self, volume_id: &str, mount_point: &str) {
        warn!(volume_id, "Cleaning up volume from failed restore");

        let attached = match self.storage.describe_volume(volume_id).await {
            Ok(volume) => volume.attachment_to(&self.job.instance_id).is_some(),
            Err(e) => {
                warn!(volume_id, "Could not describe volume: {}", e);
                false
            }
        };

        if attached {
            let _ = cleanup::UNMOUNT
                .run(self.release_mount_point(volume_id, mount_point))
                .await;
            let _ = cleanup::DETACH.run(self.attacher.detach(volume_id)).await;
        }

        let deleted: Option<()> = cleanup::DELETE
            .run(self.storage.delete_volume(volume_id))
            .await
            .unwrap_or(None);
        match deleted {
            Some(()) => info!(volume_id, "Volume deleted"),
            None => warn!(volume_id, "Volume could not be deleted and needs manual cleanup"),
        }

        // The job goes on without a warm cache, so the service runs off the root disk
        let _ = cleanup::START_SERVICE.run(self.service.start()).await;
    }

    async fn release_mount_point(&self, volume_id: &str, mount_point: &str) -> WarmvolResult<bool> {
        info!(volume_id, mount_point, "Releasing mount point of failed volume");
        mount::unmount_if_mounted(&self.host, mount_point).await
    }
}
