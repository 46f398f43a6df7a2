//! Bounded polling for cloud resource states
//!
//! Every "wait until X" in the pipeline is a [`poll_until`] call: probe,
//! sleep a fixed interval, give up at the deadline. Nothing retries past
//! the deadline.

use crate::cloud::{AttachmentStatus, BlockStorage, Snapshot, SnapshotState, Volume, VolumeState};
use crate::error::{WarmvolError, WarmvolResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Poll interval and overall deadline of one wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Outcome of a single probe
#[derive(Debug)]
pub enum Probe<T> {
    /// Target state reached
    Ready(T),
    /// Not there yet; carries the current state for logs
    Pending(String),
    /// The resource can no longer reach the target state
    Failed(String),
}

/// Probe until ready, failed, or `policy.timeout` has elapsed
pub async fn poll_until<T, F, Fut>(
    resource: &str,
    target: &str,
    policy: PollPolicy,
    mut probe: F,
) -> WarmvolResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = WarmvolResult<Probe<T>>>,
{
    let started = Instant::now();
    let deadline = started + policy.timeout;

    loop {
        match probe().await? {
            Probe::Ready(value) => {
                debug!(
                    "{} is {} after {}s",
                    resource,
                    target,
                    started.elapsed().as_secs()
                );
                return Ok(value);
            }
            Probe::Failed(state) => {
                return Err(WarmvolError::UnexpectedState {
                    resource: resource.to_string(),
                    state,
                });
            }
            Probe::Pending(state) => {
                debug!("{} is {}, waiting for {}", resource, state, target);
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(WarmvolError::WaitTimeout {
                resource: resource.to_string(),
                target: target.to_string(),
                elapsed: now - started,
            });
        }
        sleep(policy.interval.min(deadline - now)).await;
    }
}

/// Wait for a volume to reach `target`
pub async fn volume_state(
    storage: &dyn BlockStorage,
    volume_id: &str,
    target: VolumeState,
    policy: PollPolicy,
) -> WarmvolResult<Volume> {
    let resource = format!("volume {}", volume_id);
    poll_until(&resource, &target.to_string(), policy, || {
        probe_volume_state(storage, volume_id, target)
    })
    .await
}

async fn probe_volume_state(
    storage: &dyn BlockStorage,
    volume_id: &str,
    target: VolumeState,
) -> WarmvolResult<Probe<Volume>> {
    let volume = storage.describe_volume(volume_id).await?;
    Ok(if volume.state == target {
        Probe::Ready(volume)
    } else if volume.state.is_terminal() {
        Probe::Failed(volume.state.to_string())
    } else {
        Probe::Pending(volume.state.to_string())
    })
}

/// Wait for a volume to be in use with an `attached` attachment to `instance_id`
pub async fn volume_attached(
    storage: &dyn BlockStorage,
    volume_id: &str,
    instance_id: &str,
    policy: PollPolicy,
) -> WarmvolResult<Volume> {
    let resource = format!("volume {}", volume_id);
    poll_until(&resource, "attached", policy, || {
        probe_volume_attached(storage, volume_id, instance_id)
    })
    .await
}

async fn probe_volume_attached(
    storage: &dyn BlockStorage,
    volume_id: &str,
    instance_id: &str,
) -> WarmvolResult<Probe<Volume>> {
    let volume = storage.describe_volume(volume_id).await?;
    if volume.state.is_terminal() {
        return Ok(Probe::Failed(volume.state.to_string()));
    }
    let status = volume.attachment_to(instance_id).map(|a| a.status);
    Ok(match status {
        Some(AttachmentStatus::Attached) if volume.state == VolumeState::InUse => {
            Probe::Ready(volume)
        }
        Some(status) => Probe::Pending(format!("{} ({})", volume.state, status)),
        None => Probe::Pending(volume.state.to_string()),
    })
}

/// Wait for a snapshot to complete
pub async fn snapshot_completed(
    storage: &dyn BlockStorage,
    snapshot_id: &str,
    policy: PollPolicy,
) -> WarmvolResult<Snapshot> {
    let resource = format!("snapshot {}", snapshot_id);
    poll_until(&resource, "completed", policy, || {
        probe_snapshot_completed(storage, snapshot_id)
    })
    .await
}

async fn probe_snapshot_completed(
    storage: &dyn BlockStorage,
    snapshot_id: &str,
) -> WarmvolResult<Probe<Snapshot>> {
    let snapshot = storage.describe_snapshot(snapshot_id).await?;
    Ok(match snapshot.state {
        SnapshotState::Completed => Probe::Ready(snapshot),
        SnapshotState::Error => Probe::Failed(snapshot.state.to_string()),
        SnapshotState::Pending => Probe::Pending(snapshot.state.to_string()),
    })
}
