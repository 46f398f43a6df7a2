//! Attaching volumes to the current instance and detaching them again

use crate::cloud::{wait, BlockStorage, Volume, VolumeState};
use crate::config::schema::TimeoutsConfig;
use crate::error::{WarmvolError, WarmvolResult};
use crate::host::DeviceResolver;
use std::sync::Arc;
use tracing::info;

/// A volume bound to this instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub volume_id: String,
    /// Device name passed to the attach call
    pub requested_device: String,
    /// Device path the OS exposes
    pub actual_device: String,
}

/// Binds volumes to one instance
pub struct AttachmentManager {
    storage: Arc<dyn BlockStorage>,
    resolver: Arc<dyn DeviceResolver>,
    instance_id: String,
    timeouts: TimeoutsConfig,
}

impl AttachmentManager {
    pub fn new(
        storage: Arc<dyn BlockStorage>,
        resolver: Arc<dyn DeviceResolver>,
        instance_id: impl Into<String>,
        timeouts: TimeoutsConfig,
    ) -> Self {
        Self {
            storage,
            resolver,
            instance_id: instance_id.into(),
            timeouts,
        }
    }

    /// Attach `volume_id` once it is available and resolve its OS device
    pub async fn attach(
        &self,
        volume_id: &str,
        requested_device: &str,
    ) -> WarmvolResult<Attachment> {
        info!(volume_id, "Waiting for volume to become available");
        wait::volume_state(
            self.storage.as_ref(),
            volume_id,
            VolumeState::Available,
            self.timeouts.volume_available(),
        )
        .await?;

        info!(
            volume_id,
            instance_id = %self.instance_id,
            device = requested_device,
            "Attaching volume"
        );
        let requested = self
            .storage
            .attach_volume(volume_id, &self.instance_id, requested_device)
            .await?;

        let volume = wait::volume_attached(
            self.storage.as_ref(),
            volume_id,
            &self.instance_id,
            self.timeouts.volume_attached(),
        )
        .await?;

        let reported = volume
            .attachment_to(&self.instance_id)
            .map(|a| a.device.clone())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| WarmvolError::DeviceNotResolved {
                volume_id: volume_id.to_string(),
            })?;
        let actual_device = self.resolver.resolve(volume_id, &reported).await?;
        info!(
            volume_id,
            reported = %reported,
            device = %actual_device,
            resolver = self.resolver.name(),
            "Volume attached"
        );

        Ok(Attachment {
            volume_id: volume_id.to_string(),
            requested_device: requested.device,
            actual_device,
        })
    }

    /// Detach `volume_id` and wait until it is available again
    pub async fn detach(&self, volume_id: &str) -> WarmvolResult<Volume> {
        info!(volume_id, instance_id = %self.instance_id, "Detaching volume");
        self.storage
            .detach_volume(volume_id, &self.instance_id)
            .await?;

        wait::volume_state(
            self.storage.as_ref(),
            volume_id,
            VolumeState::Available,
            self.timeouts.volume_available(),
        )
        .await
    }
}

/// Device name for the `index`-th volume one job attaches.
///
/// Steps the last letter of `base`, so `/dev/sdf` gives `/dev/sdf`,
/// `/dev/sdg`, `/dev/sdh` and so on.
pub fn nth_device(base: &str, index: usize) -> WarmvolResult<String> {
    let exhausted = || {
        WarmvolError::User(format!(
            "No device name left after {} for volume #{}; set volume.device to an earlier letter",
            base,
            index + 1
        ))
    };

    let (prefix, last) = base
        .char_indices()
        .last()
        .filter(|(_, c)| c.is_ascii_lowercase())
        .map(|(i, c)| (&base[..i], c))
        .ok_or_else(exhausted)?;
    let letter = u8::try_from(index)
        .ok()
        .and_then(|n| (last as u8).checked_add(n))
        .filter(|b| *b <= b'z')
        .ok_or_else(exhausted)?;

    Ok(format!("{}{}", prefix, letter as char))
}
