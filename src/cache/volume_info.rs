//! Volume info records
//!
//! `restore` and `snapshot` run as separate processes. The restore phase
//! writes one record per mount point so the snapshot phase knows which
//! volume to detach.

use crate::error::{WarmvolError, WarmvolResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Volume currently bound to a mount point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub volume_id: String,
    pub device_name: String,
    pub mount_point: String,
}

/// Directory of volume info records
#[derive(Debug, Clone)]
pub struct VolumeInfoStore {
    dir: PathBuf,
}

impl VolumeInfoStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record path for a mount point: `/var/lib/docker` -> `snapshot-var-lib-docker.json`
    pub fn path_for(&self, mount_point: &str) -> PathBuf {
        let name = mount_point.replace('/', "-");
        self.dir
            .join(format!("snapshot-{}.json", name.trim_matches('-')))
    }

    /// Write the record, replacing any previous one for the same mount point
    pub async fn save(&self, info: &VolumeInfo) -> WarmvolResult<PathBuf> {
        fs::create_dir_all(&self.dir).await.map_err(|e| {
            WarmvolError::io(format!("creating state directory {}", self.dir.display()), e)
        })?;

        let path = self.path_for(&info.mount_point);
        let content = serde_json::to_string_pretty(info)?;
        fs::write(&path, content).await.map_err(|e| {
            WarmvolError::io(format!("writing volume info {}", path.display()), e)
        })?;

        debug!("Volume info saved to {}", path.display());
        Ok(path)
    }

    /// Read the record for `mount_point`
    pub async fn load(&self, mount_point: &str) -> WarmvolResult<VolumeInfo> {
        let path = self.path_for(mount_point);
        if !path.exists() {
            return Err(WarmvolError::VolumeInfoMissing {
                mount_point: mount_point.to_string(),
                path,
            });
        }

        let content = fs::read_to_string(&path).await.map_err(|e| {
            WarmvolError::io(format!("reading volume info {}", path.display()), e)
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}
