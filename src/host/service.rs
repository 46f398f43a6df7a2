//! Control of the service whose data directory lives on the cache volume
//!
//! The service (Docker by default) has to be stopped before its data
//! directory is unmounted or snapshotted, and started again afterwards.

use crate::config::schema::ServiceConfig;
use crate::error::{WarmvolError, WarmvolResult};
use crate::host::Host;
use tracing::debug;

/// A systemd service bound to a mount point
#[derive(Clone)]
pub struct DependentService {
    host: Host,
    config: ServiceConfig,
}

impl DependentService {
    /// Create a controller for the configured service
    pub fn new(host: Host, config: ServiceConfig) -> Self {
        Self { host, config }
    }

    /// Service unit name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Stop the service
    pub async fn stop(&self) -> WarmvolResult<()> {
        debug!("Stopping service {}", self.config.name);
        self.host
            .run_privileged("systemctl", &["stop", &self.config.name])
            .await?;
        Ok(())
    }

    /// Start the service
    pub async fn start(&self) -> WarmvolResult<()> {
        debug!("Starting service {}", self.config.name);
        self.host
            .run_privileged("systemctl", &["start", &self.config.name])
            .await
            .map_err(|e| WarmvolError::ServiceStart {
                service: self.config.name.clone(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    /// Query the service's data usage; a failure means its on-disk state is unusable.
    ///
    /// Returns the probe output, or `None` when no probe is configured.
    pub async fn health_probe(&self) -> WarmvolResult<Option<String>> {
        self.run_configured(&self.config.health_command).await
    }

    /// Drop reclaimable data (build cache) before the volume is snapshotted
    pub async fn prune(&self) -> WarmvolResult<Option<String>> {
        self.run_configured(&self.config.prune_command).await
    }

    async fn run_configured(&self, command: &[String]) -> WarmvolResult<Option<String>> {
        let Some((program, args)) = command.split_first() else {
            return Ok(None);
        };
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.host.run_privileged(program, &args).await?;
        Ok(Some(output))
    }
}
