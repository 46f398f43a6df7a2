//! Block-storage domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const GIB: u64 = 1024 * 1024 * 1024;

/// Resource tag
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Parse a `key=value` pair
    pub fn parse(s: &str) -> Option<Self> {
        let (key, value) = s.split_once('=')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some(Self::new(key, value.trim()))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Lifecycle state of a volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VolumeState {
    Creating,
    Available,
    InUse,
    Deleting,
    Deleted,
    Error,
}

impl VolumeState {
    /// Parse the API's state string
    pub fn from_api(s: &str) -> Option<Self> {
        match s {
            "creating" => Some(Self::Creating),
            "available" => Some(Self::Available),
            "in-use" => Some(Self::InUse),
            "deleting" => Some(Self::Deleting),
            "deleted" => Some(Self::Deleted),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// States a volume never leaves
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deleting | Self::Deleted | Self::Error)
    }
}

impl fmt::Display for VolumeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Creating => "creating",
            Self::Available => "available",
            Self::InUse => "in-use",
            Self::Deleting => "deleting",
            Self::Deleted => "deleted",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Status of a volume's attachment to an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentStatus {
    Attaching,
    Attached,
    Detaching,
    Detached,
    Busy,
}

impl AttachmentStatus {
    /// Parse the API's attachment state string
    pub fn from_api(s: &str) -> Option<Self> {
        match s {
            "attaching" => Some(Self::Attaching),
            "attached" => Some(Self::Attached),
            "detaching" => Some(Self::Detaching),
            "detached" => Some(Self::Detached),
            "busy" => Some(Self::Busy),
            _ => None,
        }
    }
}

impl fmt::Display for AttachmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Attaching => "attaching",
            Self::Attached => "attached",
            Self::Detaching => "detaching",
            Self::Detached => "detached",
            Self::Busy => "busy",
        };
        f.write_str(s)
    }
}

/// A volume's binding to an instance, as recorded by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeAttachment {
    pub instance_id: String,
    pub device: String,
    pub status: AttachmentStatus,
}

/// Block-storage volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub id: String,
    pub size_gib: u32,
    pub volume_type: String,
    pub availability_zone: String,
    pub state: VolumeState,
    pub attachments: Vec<VolumeAttachment>,
    pub tags: Vec<Tag>,
}

impl Volume {
    pub fn size_bytes(&self) -> u64 {
        u64::from(self.size_gib) * GIB
    }

    /// Attachment of this volume to `instance_id`, if any
    pub fn attachment_to(&self, instance_id: &str) -> Option<&VolumeAttachment> {
        self.attachments
            .iter()
            .find(|a| a.instance_id == instance_id)
    }
}

/// Lifecycle state of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotState {
    Pending,
    Completed,
    Error,
}

impl SnapshotState {
    /// Parse the API's state string
    pub fn from_api(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "error" | "recoverable" | "recovering" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_api(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SnapshotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api())
    }
}

/// Point-in-time copy of a volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub id: String,
    pub volume_id: Option<String>,
    pub volume_size_gib: u32,
    pub state: SnapshotState,
    pub start_time: DateTime<Utc>,
    pub tags: Vec<Tag>,
}

impl Snapshot {
    pub fn source_volume_size_bytes(&self) -> u64 {
        u64::from(self.volume_size_gib) * GIB
    }

    /// Value of the `Name` tag, if set
    pub fn name(&self) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == "Name")
            .map(|t| t.value.as_str())
    }
}

/// Parameters for creating a volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateVolumeRequest {
    pub availability_zone: String,
    /// Clone source; a blank volume is created when absent
    pub snapshot_id: Option<String>,
    /// Required for blank volumes; clones inherit the snapshot size
    pub size_gib: Option<u32>,
    pub volume_type: String,
    pub iops: Option<u32>,
    pub throughput_mbps: Option<u32>,
    /// Hydration rate for clones, in MiB/s
    pub initialization_rate_mbps: Option<u32>,
    pub tags: Vec<Tag>,
}

/// Tag-based snapshot query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotFilter {
    /// Every tag must match
    pub tags: Vec<Tag>,
    /// Restrict to snapshots in this state
    pub state: Option<SnapshotState>,
}
