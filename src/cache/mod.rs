//! Per-branch volume cache
//!
//! A job starts from a volume cloned from the newest snapshot of its
//! branch (or of the default branch), and folds the volume back into a
//! new snapshot when it ends. `restore` and `snapshot` run in separate
//! processes and hand over through a volume info record.
//!
//! # Lifecycle
//!
//! | Phase | Component | Result |
//! |-------|-----------|--------|
//! | restore | [`SnapshotLocator`] | snapshot to clone, or none |
//! | restore | [`VolumeProvisioner`] | clone or blank volume |
//! | restore | [`AttachmentManager`] | OS device of the attached volume |
//! | restore | [`MountOrchestrator`] | mounted volume, [`VolumeInfo`] saved |
//! | snapshot | [`SnapshotFinalizer`] | snapshot started, source volume deleted |
//!
//! A restore that fails after the volume was created deletes it again.

pub mod attach;
pub mod finalize;
pub mod key;
pub mod locator;
pub mod manager;
pub mod mount;
pub mod provisioner;
pub mod step;
pub mod volume_info;

pub use attach::{Attachment, AttachmentManager};
pub use finalize::SnapshotFinalizer;
pub use key::{tags, CacheKey, ResourceNames};
pub use locator::{Located, SnapshotLocator};
pub use manager::{RestoreOutput, SnapshotOutput, VolumeCacheManager};
pub use mount::MountOrchestrator;
pub use provisioner::{Provisioned, VolumeProvisioner};
pub use step::{Step, StepPolicy};
pub use volume_info::{VolumeInfo, VolumeInfoStore};
