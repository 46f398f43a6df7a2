//! EC2 block storage through the aws CLI
//!
//! Runs `aws ec2 ...` with JSON output and parses the responses. Request
//! structures (tag specifications, filters) are passed as JSON too, so tag
//! values never need shell-style escaping.

use crate::cloud::types::{
    AttachmentStatus, CreateVolumeRequest, Snapshot, SnapshotFilter, SnapshotState, Tag, Volume,
    VolumeAttachment, VolumeState,
};
use crate::cloud::BlockStorage;
use crate::error::{WarmvolError, WarmvolResult};
use crate::host::Host;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// EC2 volumes and snapshots managed with the aws CLI
pub struct AwsCliBlockStorage {
    host: Host,
    region: Option<String>,
    profile: Option<String>,
}

impl AwsCliBlockStorage {
    pub fn new(host: Host, region: Option<String>, profile: Option<String>) -> Self {
        Self {
            host,
            region,
            profile,
        }
    }

    /// Run `aws ec2 <args>`, mapping failures to a cloud error for `resource`
    async fn ec2(&self, operation: &str, resource: &str, args: &[String]) -> WarmvolResult<String> {
        let mut full: Vec<&str> = vec!["--output", "json"];
        if let Some(region) = &self.region {
            full.extend(["--region", region.as_str()]);
        }
        if let Some(profile) = &self.profile {
            full.extend(["--profile", profile.as_str()]);
        }
        full.push("ec2");
        full.extend(args.iter().map(String::as_str));

        debug!("{} {}", operation, resource);
        self.host.run("aws", &full).await.map_err(|e| match e {
            WarmvolError::CommandExecution { output, .. } => {
                WarmvolError::cloud(operation, resource, output)
            }
            other => other,
        })
    }
}

fn tag_specification(resource_type: &str, tags: &[Tag]) -> String {
    let tags: Vec<_> = tags
        .iter()
        .map(|t| json!({ "Key": t.key, "Value": t.value }))
        .collect();
    json!([{ "ResourceType": resource_type, "Tags": tags }]).to_string()
}

fn snapshot_filters(filter: &SnapshotFilter) -> String {
    let mut filters: Vec<_> = filter
        .tags
        .iter()
        .map(|t| json!({ "Name": format!("tag:{}", t.key), "Values": [t.value] }))
        .collect();
    if let Some(state) = filter.state {
        filters.push(json!({ "Name": "status", "Values": [state.as_api()] }));
    }
    serde_json::Value::Array(filters).to_string()
}

fn parse<'a, T: Deserialize<'a>>(operation: &str, output: &'a str) -> WarmvolResult<T> {
    serde_json::from_str(output).map_err(|e| WarmvolError::CloudResponse {
        operation: operation.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl BlockStorage for AwsCliBlockStorage {
    async fn create_volume(&self, request: &CreateVolumeRequest) -> WarmvolResult<Volume> {
        let mut args = vec![
            "create-volume".to_string(),
            "--availability-zone".to_string(),
            request.availability_zone.clone(),
            "--volume-type".to_string(),
            request.volume_type.clone(),
        ];
        let optional = [
            ("--snapshot-id", request.snapshot_id.clone()),
            ("--size", request.size_gib.map(|v| v.to_string())),
            ("--iops", request.iops.map(|v| v.to_string())),
            ("--throughput", request.throughput_mbps.map(|v| v.to_string())),
            (
                "--volume-initialization-rate",
                request.initialization_rate_mbps.map(|v| v.to_string()),
            ),
        ];
        for (flag, value) in optional {
            if let Some(value) = value {
                args.push(flag.to_string());
                args.push(value);
            }
        }
        args.push("--tag-specifications".to_string());
        args.push(tag_specification("volume", &request.tags));

        let resource = request
            .snapshot_id
            .as_deref()
            .map(|id| format!("snapshot {}", id))
            .unwrap_or_else(|| format!("blank volume in {}", request.availability_zone));
        let output = self.ec2("CreateVolume", &resource, &args).await?;
        parse::<ApiVolume>("CreateVolume", &output)?.into_volume()
    }

    async fn describe_volume(&self, volume_id: &str) -> WarmvolResult<Volume> {
        let args = ["describe-volumes", "--volume-ids", volume_id].map(String::from);
        let output = self.ec2("DescribeVolumes", volume_id, &args).await?;
        let response: DescribeVolumesOutput = parse("DescribeVolumes", &output)?;
        response
            .volumes
            .into_iter()
            .next()
            .ok_or_else(|| WarmvolError::cloud("DescribeVolumes", volume_id, "volume not found"))?
            .into_volume()
    }

    async fn delete_volume(&self, volume_id: &str) -> WarmvolResult<()> {
        let args = ["delete-volume", "--volume-id", volume_id].map(String::from);
        self.ec2("DeleteVolume", volume_id, &args).await?;
        Ok(())
    }

    async fn attach_volume(
        &self,
        volume_id: &str,
        instance_id: &str,
        device: &str,
    ) -> WarmvolResult<VolumeAttachment> {
        let args = [
            "attach-volume",
            "--volume-id",
            volume_id,
            "--instance-id",
            instance_id,
            "--device",
            device,
        ]
        .map(String::from);
        let output = self.ec2("AttachVolume", volume_id, &args).await?;
        parse::<ApiAttachment>("AttachVolume", &output)?.into_attachment()
    }

    async fn detach_volume(&self, volume_id: &str, instance_id: &str) -> WarmvolResult<()> {
        let args = [
            "detach-volume",
            "--volume-id",
            volume_id,
            "--instance-id",
            instance_id,
        ]
        .map(String::from);
        self.ec2("DetachVolume", volume_id, &args).await?;
        Ok(())
    }

    async fn create_snapshot(
        &self,
        volume_id: &str,
        description: &str,
        tags: &[Tag],
    ) -> WarmvolResult<Snapshot> {
        let args = vec![
            "create-snapshot".to_string(),
            "--volume-id".to_string(),
            volume_id.to_string(),
            "--description".to_string(),
            description.to_string(),
            "--tag-specifications".to_string(),
            tag_specification("snapshot", tags),
        ];
        let output = self.ec2("CreateSnapshot", volume_id, &args).await?;
        parse::<ApiSnapshot>("CreateSnapshot", &output)?.into_snapshot()
    }

    async fn describe_snapshot(&self, snapshot_id: &str) -> WarmvolResult<Snapshot> {
        let args = ["describe-snapshots", "--snapshot-ids", snapshot_id].map(String::from);
        let output = self.ec2("DescribeSnapshots", snapshot_id, &args).await?;
        let response: DescribeSnapshotsOutput = parse("DescribeSnapshots", &output)?;
        response
            .snapshots
            .into_iter()
            .next()
            .ok_or_else(|| {
                WarmvolError::cloud("DescribeSnapshots", snapshot_id, "snapshot not found")
            })?
            .into_snapshot()
    }

    async fn find_snapshots(&self, filter: &SnapshotFilter) -> WarmvolResult<Vec<Snapshot>> {
        let args = vec![
            "describe-snapshots".to_string(),
            "--owner-ids".to_string(),
            "self".to_string(),
            "--filters".to_string(),
            snapshot_filters(filter),
        ];
        let output = self.ec2("DescribeSnapshots", "tag filter", &args).await?;
        let response: DescribeSnapshotsOutput = parse("DescribeSnapshots", &output)?;
        response
            .snapshots
            .into_iter()
            .map(ApiSnapshot::into_snapshot)
            .collect()
    }

    fn backend_name(&self) -> &'static str {
        "EC2 (aws CLI)"
    }
}

// Response shapes of the EC2 API as printed by `aws --output json`.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiTag {
    key: String,
    value: String,
}

fn into_tags(tags: Vec<ApiTag>) -> Vec<Tag> {
    tags.into_iter().map(|t| Tag::new(t.key, t.value)).collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiAttachment {
    #[serde(default)]
    instance_id: String,
    #[serde(default)]
    device: String,
    state: String,
}

impl ApiAttachment {
    fn into_attachment(self) -> WarmvolResult<VolumeAttachment> {
        let status = AttachmentStatus::from_api(&self.state).ok_or_else(|| {
            WarmvolError::CloudResponse {
                operation: "AttachVolume".to_string(),
                reason: format!("unknown attachment state {}", self.state),
            }
        })?;
        Ok(VolumeAttachment {
            instance_id: self.instance_id,
            device: self.device,
            status,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiVolume {
    volume_id: String,
    #[serde(default)]
    size: u32,
    #[serde(default)]
    volume_type: String,
    #[serde(default)]
    availability_zone: String,
    state: String,
    #[serde(default)]
    attachments: Vec<ApiAttachment>,
    #[serde(default)]
    tags: Vec<ApiTag>,
}

impl ApiVolume {
    fn into_volume(self) -> WarmvolResult<Volume> {
        let state = VolumeState::from_api(&self.state).ok_or_else(|| {
            WarmvolError::CloudResponse {
                operation: "DescribeVolumes".to_string(),
                reason: format!("unknown volume state {}", self.state),
            }
        })?;
        let attachments = self
            .attachments
            .into_iter()
            .map(ApiAttachment::into_attachment)
            .collect::<WarmvolResult<Vec<_>>>()?;
        Ok(Volume {
            id: self.volume_id,
            size_gib: self.size,
            volume_type: self.volume_type,
            availability_zone: self.availability_zone,
            state,
            attachments,
            tags: into_tags(self.tags),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeVolumesOutput {
    volumes: Vec<ApiVolume>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiSnapshot {
    snapshot_id: String,
    #[serde(default)]
    volume_id: Option<String>,
    #[serde(default)]
    volume_size: u32,
    state: String,
    start_time: DateTime<Utc>,
    #[serde(default)]
    tags: Vec<ApiTag>,
}

impl ApiSnapshot {
    fn into_snapshot(self) -> WarmvolResult<Snapshot> {
        let state = SnapshotState::from_api(&self.state).ok_or_else(|| {
            WarmvolError::CloudResponse {
                operation: "DescribeSnapshots".to_string(),
                reason: format!("unknown snapshot state {}", self.state),
            }
        })?;
        Ok(Snapshot {
            id: self.snapshot_id,
            volume_id: self.volume_id,
            volume_size_gib: self.volume_size,
            state,
            start_time: self.start_time,
            tags: into_tags(self.tags),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeSnapshotsOutput {
    snapshots: Vec<ApiSnapshot>,
}
