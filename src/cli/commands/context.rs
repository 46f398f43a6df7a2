//! Wiring shared by the cache commands
//!
//! Turns flags, environment and config into a `JobContext` and the host and
//! cloud handles a `VolumeCacheManager` is built from.

use crate::cache::key::tags;
use crate::cache::VolumeCacheManager;
use crate::cli::args::JobArgs;
use crate::cloud::{AwsCliBlockStorage, BlockStorage, Tag};
use crate::config::schema::DeviceResolution;
use crate::config::{Config, JobContext, RunnerConfig};
use crate::error::WarmvolResult;
use crate::host::{self, BlockModelMatch, DeviceResolver, Host, ReportedDevice, SystemCommandRunner};
use std::sync::Arc;
use tracing::{debug, warn};

/// Gather the job's identity from flags, environment and the runner config.
///
/// Fails before any network access when the repository or ref is missing.
pub async fn job_context(args: &JobArgs) -> WarmvolResult<JobContext> {
    let mut job = JobContext {
        repository: args.repository.clone().unwrap_or_default(),
        branch_ref: args.git_ref.clone().unwrap_or_default(),
        default_branch: args.default_branch.clone().filter(|b| !b.is_empty()),
        custom_tags: Vec::new(),
        instance_id: args.instance_id.clone().unwrap_or_default(),
        availability_zone: args.availability_zone.clone().unwrap_or_default(),
    };
    for tag in &args.tags {
        job.set_tag(tag.clone());
    }

    if let Some(path) = &args.runner_config {
        if path.exists() {
            debug!("Reading runner config {}", path.display());
            job.merge_runner_config(RunnerConfig::load(path).await?);
        } else {
            warn!("Runner config {} not found, ignoring", path.display());
        }
    }

    job.validate_lineage()?;
    Ok(job)
}

/// Job identity for one of several mount points cached by the same job
pub fn for_mount_point(job: &JobContext, mount_point: &str, total: usize) -> JobContext {
    let mut job = job.clone();
    if total > 1 {
        job.set_tag(Tag::new(tags::MOUNT_POINT, mount_point));
    }
    job
}

/// Host and cloud handles for one invocation
pub struct CacheContext {
    pub host: Host,
    pub storage: Arc<dyn BlockStorage>,
    pub resolver: Arc<dyn DeviceResolver>,
}

impl CacheContext {
    /// Build real handles from `config`; the region falls back to the job's zone
    pub fn new(config: &Config, job: &JobContext) -> Self {
        let runner = Arc::new(SystemCommandRunner::new(config.timeouts.command()));
        let host = Host::new(runner, host::sudo_required(config.host.sudo));
        debug!(sudo = host.uses_sudo(), "Host command runner ready");

        let region = config
            .aws
            .region
            .clone()
            .or_else(|| job.region().map(String::from));
        let storage: Arc<dyn BlockStorage> = Arc::new(AwsCliBlockStorage::new(
            host.clone(),
            region,
            config.aws.profile.clone(),
        ));

        let resolver: Arc<dyn DeviceResolver> = match config.host.device_resolution {
            DeviceResolution::BlockModel => Arc::new(BlockModelMatch::new(
                host.clone(),
                config.host.device_model.clone(),
            )),
            DeviceResolution::Reported => Arc::new(ReportedDevice),
        };

        Self {
            host,
            storage,
            resolver,
        }
    }

    /// Cache manager for `job`
    pub fn manager(&self, config: &Config, job: JobContext) -> WarmvolResult<VolumeCacheManager> {
        VolumeCacheManager::new(
            config,
            job,
            self.host.clone(),
            self.storage.clone(),
            self.resolver.clone(),
        )
    }
}
