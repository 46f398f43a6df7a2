//! EC2 instance metadata (IMDSv2) lookups
//!
//! Used only when the instance id or availability zone is not given
//! explicitly.

use crate::error::{WarmvolError, WarmvolResult};
use std::time::Duration;
use tracing::debug;

/// Link-local metadata endpoint
pub const DEFAULT_ENDPOINT: &str = "http://169.254.169.254";

const TOKEN_TTL_SECS: &str = "300";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Identity of the instance the job runs on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceIdentity {
    pub instance_id: String,
    pub availability_zone: String,
}

/// Query instance id and availability zone from the metadata service at `endpoint`
pub async fn instance_identity(endpoint: &str) -> WarmvolResult<InstanceIdentity> {
    let endpoint = endpoint.trim_end_matches('/').to_string();
    tokio::task::spawn_blocking(move || fetch_identity(&endpoint))
        .await
        .map_err(|e| WarmvolError::Internal(format!("metadata lookup task failed: {}", e)))?
}

fn fetch_identity(endpoint: &str) -> WarmvolResult<InstanceIdentity> {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(REQUEST_TIMEOUT))
        .build()
        .into();

    let token = agent
        .put(&format!("{}/latest/api/token", endpoint))
        .header("X-aws-ec2-metadata-token-ttl-seconds", TOKEN_TTL_SECS)
        .send_empty()
        .and_then(|mut r| r.body_mut().read_to_string())
        .map_err(|e| WarmvolError::Imds(format!("requesting token: {}", e)))?;

    let get = |path: &str| -> WarmvolResult<String> {
        let value = agent
            .get(&format!("{}/latest/meta-data/{}", endpoint, path))
            .header("X-aws-ec2-metadata-token", token.as_str())
            .call()
            .and_then(|mut r| r.body_mut().read_to_string())
            .map_err(|e| WarmvolError::Imds(format!("reading {}: {}", path, e)))?;
        Ok(value.trim().to_string())
    };

    let identity = InstanceIdentity {
        instance_id: get("instance-id")?,
        availability_zone: get("placement/availability-zone")?,
    };
    debug!(
        "Instance metadata: {} in {}",
        identity.instance_id, identity.availability_zone
    );
    Ok(identity)
}
