//! Resolution of the OS-visible device path of an attached volume
//!
//! The attachment API records the device name that was requested
//! (`/dev/sdf`), but on Nitro instances the kernel exposes the volume as an
//! NVMe namespace (`/dev/nvme1n1`). Resolution is a strategy so other
//! platforms can plug in their own matching.

use crate::error::{WarmvolError, WarmvolResult};
use crate::host::Host;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Maps an attached volume to the device path the OS actually uses
#[async_trait]
pub trait DeviceResolver: Send + Sync {
    /// Resolve the device for `volume_id`, given what the attachment API reported
    async fn resolve(&self, volume_id: &str, reported_device: &str) -> WarmvolResult<String>;

    /// Strategy name for logs
    fn name(&self) -> &'static str;
}

/// Trusts the device recorded on the attachment
pub struct ReportedDevice;

#[async_trait]
impl DeviceResolver for ReportedDevice {
    async fn resolve(&self, volume_id: &str, reported_device: &str) -> WarmvolResult<String> {
        if reported_device.is_empty() {
            return Err(WarmvolError::DeviceNotResolved {
                volume_id: volume_id.to_string(),
            });
        }
        Ok(reported_device.to_string())
    }

    fn name(&self) -> &'static str {
        "reported"
    }
}

/// Enumerates block devices and matches them by serial or hardware model
pub struct BlockModelMatch {
    host: Host,
    model: String,
}

impl BlockModelMatch {
    /// Match disks whose model equals `model` (e.g. "Amazon Elastic Block Store")
    pub fn new(host: Host, model: impl Into<String>) -> Self {
        Self {
            host,
            model: model.into(),
        }
    }
}

#[async_trait]
impl DeviceResolver for BlockModelMatch {
    async fn resolve(&self, volume_id: &str, reported_device: &str) -> WarmvolResult<String> {
        let output = match self
            .host
            .run("lsblk", &["-J", "-o", "PATH,MODEL,SERIAL,MOUNTPOINT"])
            .await
        {
            Ok(output) => output,
            Err(e) => {
                warn!("Failed to list block devices, keeping {}: {}", reported_device, e);
                return ReportedDevice.resolve(volume_id, reported_device).await;
            }
        };

        let listing: LsblkOutput = serde_json::from_str(&output)?;
        for dev in &listing.blockdevices {
            debug!(
                "Block device {} model={:?} serial={:?}",
                dev.path, dev.model, dev.serial
            );
        }

        match pick_device(&listing.blockdevices, volume_id, &self.model) {
            Some(path) => {
                info!(volume_id, device = %path, "Resolved device from block device listing");
                Ok(path)
            }
            None => {
                warn!(
                    "No block device matched volume {} or model {:?}, keeping {}",
                    volume_id, self.model, reported_device
                );
                ReportedDevice.resolve(volume_id, reported_device).await
            }
        }
    }

    fn name(&self) -> &'static str {
        "block-model"
    }
}

/// `lsblk -J` document
#[derive(Debug, Deserialize)]
pub struct LsblkOutput {
    pub blockdevices: Vec<BlockDevice>,
}

/// One entry of `lsblk -J`, with its partitions as children
#[derive(Debug, Deserialize)]
pub struct BlockDevice {
    pub path: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub mountpoint: Option<String>,
    #[serde(default)]
    pub children: Vec<BlockDevice>,
}

impl BlockDevice {
    /// Whether this disk, or one of its partitions, holds the root filesystem
    fn holds_root(&self) -> bool {
        self.mountpoint.as_deref() == Some("/") || self.children.iter().any(Self::holds_root)
    }

    fn model_is(&self, model: &str) -> bool {
        self.model.as_deref().map(str::trim) == Some(model)
    }
}

/// Choose the disk backing `volume_id`.
///
/// NVMe EBS disks carry the volume id without its dash as serial, which is
/// exact. Otherwise the last non-root disk with the expected model wins.
pub fn pick_device(devices: &[BlockDevice], volume_id: &str, model: &str) -> Option<String> {
    let serial = volume_id.replace('-', "");
    if let Some(dev) = devices.iter().find(|d| {
        d.serial
            .as_deref()
            .map(str::trim)
            .is_some_and(|s| s == serial || s == volume_id)
    }) {
        return Some(dev.path.clone());
    }

    devices
        .iter()
        .filter(|d| d.model_is(model) && !d.holds_root())
        .last()
        .map(|d| d.path.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRunner;
    use std::sync::Arc;

    const EBS: &str = "Amazon Elastic Block Store";

    const NITRO_LISTING: &str = r#"{
       "blockdevices": [
          {"path":"/dev/nvme0n1", "model":"Amazon Elastic Block Store              ", "serial":"vol0aaa", "mountpoint":null,
             "children": [
                {"path":"/dev/nvme0n1p1", "model":null, "serial":null, "mountpoint":"/"},
                {"path":"/dev/nvme0n1p15", "model":null, "serial":null, "mountpoint":"/boot/efi"}
             ]
          },
          {"path":"/dev/nvme1n1", "model":"Amazon Elastic Block Store              ", "serial":"vol0bbb", "mountpoint":null},
          {"path":"/dev/nvme2n1", "model":"Amazon EC2 NVMe Instance Storage", "serial":"AWS1234", "mountpoint":null}
       ]
    }"#;

    fn listing() -> Vec<BlockDevice> {
        serde_json::from_str::<LsblkOutput>(NITRO_LISTING)
            .unwrap()
            .blockdevices
    }

    #[test]
    fn serial_match_wins() {
        assert_eq!(
            pick_device(&listing(), "vol-0bbb", EBS),
            Some("/dev/nvme1n1".to_string())
        );
    }

    #[test]
    fn model_match_skips_root_disk() {
        assert_eq!(
            pick_device(&listing(), "vol-0ccc", EBS),
            Some("/dev/nvme1n1".to_string())
        );
    }

    #[test]
    fn only_root_disk_matches_gives_none() {
        let devices: Vec<BlockDevice> = listing()
            .into_iter()
            .filter(|d| d.path != "/dev/nvme1n1")
            .collect();
        assert_eq!(pick_device(&devices, "vol-0ccc", EBS), None);
    }

    #[tokio::test]
    async fn resolver_uses_lsblk_listing() {
        let runner = Arc::new(FakeRunner::new());
        runner.respond("lsblk", NITRO_LISTING);
        let resolver = BlockModelMatch::new(Host::new(runner, true), EBS);

        let device = resolver.resolve("vol-0bbb", "/dev/sdf").await.unwrap();
        assert_eq!(device, "/dev/nvme1n1");
    }

    #[tokio::test]
    async fn resolver_falls_back_to_reported_device() {
        let runner = Arc::new(FakeRunner::new());
        runner.fail("lsblk", "lsblk: unknown column: PATH");
        let resolver = BlockModelMatch::new(Host::new(runner, true), EBS);

        let device = resolver.resolve("vol-0bbb", "/dev/xvdf").await.unwrap();
        assert_eq!(device, "/dev/xvdf");
    }

    #[tokio::test]
    async fn reported_device_must_exist() {
        let err = ReportedDevice.resolve("vol-1", "").await.unwrap_err();
        assert!(matches!(err, WarmvolError::DeviceNotResolved { .. }));
    }
}
