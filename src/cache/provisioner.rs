//! Volume creation from a snapshot or blank

use crate::cache::key::CacheKey;
use crate::cloud::{BlockStorage, CreateVolumeRequest, Snapshot, Volume};
use crate::config::schema::VolumeConfig;
use crate::error::WarmvolResult;
use std::sync::Arc;
use tracing::info;

/// A freshly created volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    pub volume: Volume,
    /// Blank volumes carry no filesystem yet; clones inherit the snapshot's
    pub needs_format: bool,
}

/// Creates cache volumes
pub struct VolumeProvisioner {
    storage: Arc<dyn BlockStorage>,
    config: VolumeConfig,
}

impl VolumeProvisioner {
    pub fn new(storage: Arc<dyn BlockStorage>, config: VolumeConfig) -> Self {
        Self { storage, config }
    }

    /// Create request for a clone of `snapshot`, or a blank volume when `None`
    pub fn request(
        &self,
        snapshot: Option<&Snapshot>,
        availability_zone: &str,
        key: &CacheKey,
        name: &str,
    ) -> CreateVolumeRequest {
        let nonzero = |v: u32| (v > 0).then_some(v);
        CreateVolumeRequest {
            availability_zone: availability_zone.to_string(),
            snapshot_id: snapshot.map(|s| s.id.clone()),
            size_gib: match snapshot {
                Some(_) => None,
                None => Some(self.config.size_gib),
            },
            volume_type: self.config.volume_type.clone(),
            iops: nonzero(self.config.iops),
            throughput_mbps: nonzero(self.config.throughput_mbps),
            initialization_rate_mbps: snapshot
                .and_then(|_| nonzero(self.config.initialization_rate_mbps)),
            tags: key.tags_with_name(name),
        }
    }

    /// Create the volume in the job's availability zone
    pub async fn provision(
        &self,
        snapshot: Option<&Snapshot>,
        availability_zone: &str,
        key: &CacheKey,
        name: &str,
    ) -> WarmvolResult<Provisioned> {
        let request = self.request(snapshot, availability_zone, key, name);
        match snapshot {
            Some(s) => info!(snapshot_id = %s.id, "Creating volume {} from snapshot", name),
            None => info!(
                size_gib = self.config.size_gib,
                "Creating blank volume {}", name
            ),
        }

        let volume = self.storage.create_volume(&request).await?;
        info!(volume_id = %volume.id, state = %volume.state, "Volume created");
        Ok(Provisioned {
            volume,
            needs_format: snapshot.is_none(),
        })
    }
}
