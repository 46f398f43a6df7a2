//! Cloud block-storage abstraction
//!
//! Provides a trait for the volume and snapshot operations the cache needs,
//! so the pipeline can run against EC2 (through the aws CLI) or an
//! in-memory fake.

mod aws_cli;
pub mod types;
pub mod wait;

pub use aws_cli::AwsCliBlockStorage;
pub use types::{
    AttachmentStatus, CreateVolumeRequest, Snapshot, SnapshotFilter, SnapshotState, Tag, Volume,
    VolumeAttachment, VolumeState,
};
pub use wait::{PollPolicy, Probe};

use crate::error::WarmvolResult;
use async_trait::async_trait;

/// Abstract block-storage interface
#[async_trait]
pub trait BlockStorage: Send + Sync {
    /// Create a volume and return it as first reported (usually `creating`)
    async fn create_volume(&self, request: &CreateVolumeRequest) -> WarmvolResult<Volume>;

    /// Fetch the current state of a volume
    async fn describe_volume(&self, volume_id: &str) -> WarmvolResult<Volume>;

    /// Delete a volume
    async fn delete_volume(&self, volume_id: &str) -> WarmvolResult<()>;

    /// Request attachment of a volume to an instance at `device`.
    ///
    /// The returned device is a hint; the platform may expose the volume
    /// under a different path.
    async fn attach_volume(
        &self,
        volume_id: &str,
        instance_id: &str,
        device: &str,
    ) -> WarmvolResult<VolumeAttachment>;

    /// Request detachment of a volume from an instance
    async fn detach_volume(&self, volume_id: &str, instance_id: &str) -> WarmvolResult<()>;

    /// Start a snapshot of a volume
    async fn create_snapshot(
        &self,
        volume_id: &str,
        description: &str,
        tags: &[Tag],
    ) -> WarmvolResult<Snapshot>;

    /// Fetch the current state of a snapshot
    async fn describe_snapshot(&self, snapshot_id: &str) -> WarmvolResult<Snapshot>;

    /// List snapshots owned by this account that match `filter`
    async fn find_snapshots(&self, filter: &SnapshotFilter) -> WarmvolResult<Vec<Snapshot>>;

    /// Backend name for display
    fn backend_name(&self) -> &'static str;
}
