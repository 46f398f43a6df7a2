//! Configuration schema for warmvol
//!
//! Configuration is stored at `~/.config/warmvol/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::cloud::PollPolicy;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Volume provisioning settings
    pub volume: VolumeConfig,

    /// Snapshot settings
    pub snapshot: SnapshotConfig,

    /// Service bound to the mount point
    pub service: ServiceConfig,

    /// Bounded wait settings
    pub timeouts: TimeoutsConfig,

    /// Local machine settings
    pub host: HostConfig,

    /// AWS CLI settings
    pub aws: AwsConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Directory holding the per-mount-point volume info records
    pub state_dir: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            state_dir: None,
        }
    }
}

/// Volume provisioning settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Size of blank volumes in GiB
    pub size_gib: u32,

    /// Snapshots of smaller volumes are never cloned
    pub min_size_gib: u32,

    /// EBS volume type
    pub volume_type: String,

    pub iops: u32,

    pub throughput_mbps: u32,

    /// Hydration rate for volumes cloned from a snapshot, in MiB/s (0 = platform default)
    pub initialization_rate_mbps: u32,

    /// Device name requested on attach
    pub device: String,

    /// Filesystem created on blank volumes
    pub filesystem: String,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            size_gib: 40,
            min_size_gib: 40,
            volume_type: "gp3".to_string(),
            iops: 3000,
            throughput_mbps: 125,
            initialization_rate_mbps: 300,
            device: "/dev/sdf".to_string(),
            filesystem: "ext4".to_string(),
        }
    }
}

/// Snapshot settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Bumped when the on-disk layout changes so old lineages are ignored
    pub format_version: String,

    /// Block until the snapshot completes
    pub wait_for_completion: bool,

    /// Prefix of generated volume and snapshot names
    pub name_prefix: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            format_version: "v1".to_string(),
            wait_for_completion: false,
            name_prefix: "warmvol".to_string(),
        }
    }
}

/// Service whose data directory lives on the volume
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// systemd unit name
    pub name: String,

    /// Run after mount; failure marks the cache as corrupt (empty = skip)
    pub health_command: Vec<String>,

    /// Run before snapshotting to drop reclaimable data (empty = skip)
    pub prune_command: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "docker".to_string(),
            health_command: ["docker", "system", "df"].map(String::from).to_vec(),
            prune_command: ["docker", "builder", "prune", "-f"]
                .map(String::from)
                .to_vec(),
        }
    }
}

/// Bounded wait settings, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    pub volume_available_secs: u64,
    pub volume_attached_secs: u64,
    pub snapshot_completed_secs: u64,
    pub volume_poll_secs: u64,
    pub snapshot_poll_secs: u64,

    /// Limit for any single external command
    pub command_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            volume_available_secs: 300,
            volume_attached_secs: 300,
            snapshot_completed_secs: 600,
            volume_poll_secs: 3,
            snapshot_poll_secs: 5,
            command_secs: 600,
        }
    }
}

impl TimeoutsConfig {
    pub fn volume_available(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.volume_poll_secs),
            Duration::from_secs(self.volume_available_secs),
        )
    }

    pub fn volume_attached(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.volume_poll_secs),
            Duration::from_secs(self.volume_attached_secs),
        )
    }

    pub fn snapshot_completed(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.snapshot_poll_secs),
            Duration::from_secs(self.snapshot_completed_secs),
        )
    }

    pub fn command(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }
}

/// When privileged commands go through sudo
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SudoMode {
    /// Unless running as root
    #[default]
    Auto,
    Always,
    Never,
}

/// How the OS device of an attached volume is found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceResolution {
    /// Match `lsblk` serial or model, then fall back to the reported device
    #[default]
    BlockModel,
    /// Trust the device on the attachment record
    Reported,
}

/// Local machine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub sudo: SudoMode,

    pub device_resolution: DeviceResolution,

    /// Hardware model of cloud block storage disks
    pub device_model: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            sudo: SudoMode::Auto,
            device_resolution: DeviceResolution::BlockModel,
            device_model: "Amazon Elastic Block Store".to_string(),
        }
    }
}

/// AWS CLI settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// AWS region (defaults to the CLI's own resolution)
    pub region: Option<String>,

    /// AWS profile to use
    pub profile: Option<String>,
}
