//! In-memory fakes for the host and the cloud
//!
//! `FakeRunner` answers commands from a script and records every call.
//! `FakeBlockStorage` walks volumes and snapshots through their lifecycle
//! one step per describe call, the way the real API reports progress.

use crate::cloud::{
    AttachmentStatus, BlockStorage, CreateVolumeRequest, Snapshot, SnapshotFilter, SnapshotState,
    Tag, Volume, VolumeAttachment, VolumeState,
};
use crate::error::{WarmvolError, WarmvolResult};
use crate::host::{command_line, CommandRunner};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Scripted command runner
#[derive(Default)]
pub struct FakeRunner {
    script: Mutex<Vec<(String, Result<String, String>)>>,
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `prefix` with `output`
    pub fn respond(&self, prefix: &str, output: &str) {
        self.script
            .lock()
            .unwrap()
            .push((prefix.to_string(), Ok(output.to_string())));
    }

    /// Fail commands starting with `prefix`, reporting `output`
    pub fn fail(&self, prefix: &str, output: &str) {
        self.script
            .lock()
            .unwrap()
            .push((prefix.to_string(), Err(output.to_string())));
    }

    /// Every command line run so far, sudo included
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that start with `prefix`
    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, program: &str, args: &[&str]) -> WarmvolResult<String> {
        let line = command_line(program, args);
        self.calls.lock().unwrap().push(line.clone());

        let script = self.script.lock().unwrap();
        match script.iter().find(|(prefix, _)| line.starts_with(prefix.as_str())) {
            Some((_, Ok(output))) => Ok(output.clone()),
            Some((_, Err(output))) => Err(WarmvolError::command_exec(line, output.clone())),
            None => Ok(String::new()),
        }
    }
}

#[derive(Default)]
struct StorageState {
    next_id: u32,
    volumes: BTreeMap<String, Volume>,
    snapshots: BTreeMap<String, Snapshot>,
    created: Vec<CreateVolumeRequest>,
    delete_calls: HashMap<String, u32>,
    fail_attach: Option<String>,
    never_available: bool,
    snapshot_outcome: Option<SnapshotState>,
    exposed_device: Option<String>,
}

impl StorageState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:04}", prefix, self.next_id)
    }

    fn volume_mut(&mut self, operation: &str, volume_id: &str) -> WarmvolResult<&mut Volume> {
        self.volumes
            .get_mut(volume_id)
            .ok_or_else(|| WarmvolError::cloud(operation, volume_id, "InvalidVolume.NotFound"))
    }
}

/// In-memory block storage
#[derive(Default)]
pub struct FakeBlockStorage {
    state: Mutex<StorageState>,
}

impl FakeBlockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an existing snapshot
    pub fn seed_snapshot(
        &self,
        id: &str,
        volume_size_gib: u32,
        state: SnapshotState,
        start_time: DateTime<Utc>,
        tags: Vec<Tag>,
    ) {
        self.state.lock().unwrap().snapshots.insert(
            id.to_string(),
            Snapshot {
                id: id.to_string(),
                volume_id: None,
                volume_size_gib,
                state,
                start_time,
                tags,
            },
        );
    }

    /// Reject attach requests with `reason`
    pub fn fail_attach(&self, reason: &str) {
        self.state.lock().unwrap().fail_attach = Some(reason.to_string());
    }

    /// Keep new volumes in `creating` forever
    pub fn never_available(&self) {
        self.state.lock().unwrap().never_available = true;
    }

    /// Keep new snapshots in `pending` forever
    pub fn stall_snapshots(&self) {
        self.state.lock().unwrap().snapshot_outcome = Some(SnapshotState::Pending);
    }

    /// Move new snapshots to `error` instead of `completed`
    pub fn fail_snapshots(&self) {
        self.state.lock().unwrap().snapshot_outcome = Some(SnapshotState::Error);
    }

    /// Report attachments under `device` instead of the requested one
    pub fn expose_device(&self, device: &str) {
        self.state.lock().unwrap().exposed_device = Some(device.to_string());
    }

    pub fn volume(&self, volume_id: &str) -> Option<Volume> {
        self.state.lock().unwrap().volumes.get(volume_id).cloned()
    }

    /// Volumes that still exist
    pub fn volumes(&self) -> Vec<Volume> {
        self.state.lock().unwrap().volumes.values().cloned().collect()
    }

    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.state
            .lock()
            .unwrap()
            .snapshots
            .values()
            .cloned()
            .collect()
    }

    /// Every create-volume request received
    pub fn created(&self) -> Vec<CreateVolumeRequest> {
        self.state.lock().unwrap().created.clone()
    }

    /// Number of delete calls for `volume_id`, successful or not
    pub fn delete_calls(&self, volume_id: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .delete_calls
            .get(volume_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl BlockStorage for FakeBlockStorage {
    async fn create_volume(&self, request: &CreateVolumeRequest) -> WarmvolResult<Volume> {
        let mut state = self.state.lock().unwrap();
        let size_gib = match (&request.snapshot_id, request.size_gib) {
            (Some(snapshot_id), _) => {
                state
                    .snapshots
                    .get(snapshot_id)
                    .ok_or_else(|| {
                        WarmvolError::cloud("CreateVolume", snapshot_id, "InvalidSnapshot.NotFound")
                    })?
                    .volume_size_gib
            }
            (None, Some(size)) => size,
            (None, None) => {
                return Err(WarmvolError::cloud(
                    "CreateVolume",
                    &request.availability_zone,
                    "size or snapshot required",
                ))
            }
        };

        let id = state.next_id("vol");
        let volume = Volume {
            id: id.clone(),
            size_gib,
            volume_type: request.volume_type.clone(),
            availability_zone: request.availability_zone.clone(),
            state: VolumeState::Creating,
            attachments: Vec::new(),
            tags: request.tags.clone(),
        };
        state.created.push(request.clone());
        state.volumes.insert(id, volume.clone());
        Ok(volume)
    }

    async fn describe_volume(&self, volume_id: &str) -> WarmvolResult<Volume> {
        let mut state = self.state.lock().unwrap();
        let never_available = state.never_available;
        let volume = state.volume_mut("DescribeVolumes", volume_id)?;
        let snapshot = volume.clone();

        // Advance one step for the next caller
        if volume.state == VolumeState::Creating && !never_available {
            volume.state = VolumeState::Available;
        }
        match volume.attachments.first().map(|a| a.status) {
            Some(AttachmentStatus::Attaching) => {
                volume.attachments[0].status = AttachmentStatus::Attached;
                volume.state = VolumeState::InUse;
            }
            Some(AttachmentStatus::Detaching) => {
                volume.attachments.clear();
                volume.state = VolumeState::Available;
            }
            _ => {}
        }
        Ok(snapshot)
    }

    async fn delete_volume(&self, volume_id: &str) -> WarmvolResult<()> {
        let mut state = self.state.lock().unwrap();
        *state.delete_calls.entry(volume_id.to_string()).or_default() += 1;

        let volume = state.volume_mut("DeleteVolume", volume_id)?;
        if !volume.attachments.is_empty() {
            return Err(WarmvolError::cloud(
                "DeleteVolume",
                volume_id,
                "VolumeInUse: volume is attached",
            ));
        }
        state.volumes.remove(volume_id);
        Ok(())
    }

    async fn attach_volume(
        &self,
        volume_id: &str,
        instance_id: &str,
        device: &str,
    ) -> WarmvolResult<VolumeAttachment> {
        let mut state = self.state.lock().unwrap();
        if let Some(reason) = state.fail_attach.clone() {
            return Err(WarmvolError::cloud("AttachVolume", volume_id, reason));
        }
        let in_use = state.volumes.values().any(|v| {
            v.id != volume_id
                && v.attachments
                    .iter()
                    .any(|a| a.instance_id == instance_id && a.device == device)
        });
        if in_use {
            return Err(WarmvolError::cloud(
                "AttachVolume",
                volume_id,
                format!("InvalidParameterValue: Attachment point {} is already in use", device),
            ));
        }
        let exposed = state.exposed_device.clone();
        let volume = state.volume_mut("AttachVolume", volume_id)?;
        if volume.state != VolumeState::Available {
            return Err(WarmvolError::cloud(
                "AttachVolume",
                volume_id,
                format!("IncorrectState: volume is {}", volume.state),
            ));
        }

        let attachment = VolumeAttachment {
            instance_id: instance_id.to_string(),
            device: device.to_string(),
            status: AttachmentStatus::Attaching,
        };
        volume.attachments = vec![VolumeAttachment {
            device: exposed.unwrap_or_else(|| device.to_string()),
            ..attachment.clone()
        }];
        Ok(attachment)
    }

    async fn detach_volume(&self, volume_id: &str, instance_id: &str) -> WarmvolResult<()> {
        let mut state = self.state.lock().unwrap();
        let volume = state.volume_mut("DetachVolume", volume_id)?;
        let attachment = volume
            .attachments
            .iter_mut()
            .find(|a| a.instance_id == instance_id)
            .ok_or_else(|| {
                WarmvolError::cloud("DetachVolume", volume_id, "IncorrectState: not attached")
            })?;
        attachment.status = AttachmentStatus::Detaching;
        Ok(())
    }

    async fn create_snapshot(
        &self,
        volume_id: &str,
        _description: &str,
        tags: &[Tag],
    ) -> WarmvolResult<Snapshot> {
        let mut state = self.state.lock().unwrap();
        let size_gib = state.volume_mut("CreateSnapshot", volume_id)?.size_gib;
        let id = state.next_id("snap");
        let snapshot = Snapshot {
            id: id.clone(),
            volume_id: Some(volume_id.to_string()),
            volume_size_gib: size_gib,
            state: SnapshotState::Pending,
            start_time: Utc::now(),
            tags: tags.to_vec(),
        };
        state.snapshots.insert(id, snapshot.clone());
        Ok(snapshot)
    }

    async fn describe_snapshot(&self, snapshot_id: &str) -> WarmvolResult<Snapshot> {
        let mut state = self.state.lock().unwrap();
        let outcome = state.snapshot_outcome.unwrap_or(SnapshotState::Completed);
        let snapshot = state.snapshots.get_mut(snapshot_id).ok_or_else(|| {
            WarmvolError::cloud("DescribeSnapshots", snapshot_id, "InvalidSnapshot.NotFound")
        })?;
        let current = snapshot.clone();
        if snapshot.state == SnapshotState::Pending {
            snapshot.state = outcome;
        }
        Ok(current)
    }

    async fn find_snapshots(&self, filter: &SnapshotFilter) -> WarmvolResult<Vec<Snapshot>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .snapshots
            .values()
            .filter(|s| filter.tags.iter().all(|t| s.tags.contains(t)))
            .filter(|s| filter.state.map_or(true, |wanted| s.state == wanted))
            .cloned()
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "in-memory"
    }
}
