//! Host-side operations
//!
//! Wraps the [`CommandRunner`] with privilege handling and groups the OS
//! level building blocks used by the cache pipeline:
//! - `mount`: format, mount, unmount and mount-table checks
//! - `service`: control of the service whose data lives on the volume
//! - `device`: resolution of the OS device path of an attached volume

pub mod device;
pub mod mount;
mod runner;
pub mod service;

pub use device::{BlockModelMatch, DeviceResolver, ReportedDevice};
pub use runner::{command_line, CommandRunner, SystemCommandRunner};
pub use service::DependentService;

use crate::config::schema::SudoMode;
use crate::error::WarmvolResult;
use std::sync::Arc;

/// Handle to the local machine's command execution
#[derive(Clone)]
pub struct Host {
    runner: Arc<dyn CommandRunner>,
    sudo: bool,
}

impl Host {
    /// Create a host handle; `sudo` prefixes privileged commands with `sudo`
    pub fn new(runner: Arc<dyn CommandRunner>, sudo: bool) -> Self {
        Self { runner, sudo }
    }

    /// Whether privileged commands are run through sudo
    pub fn uses_sudo(&self) -> bool {
        self.sudo
    }

    /// Run an unprivileged command
    pub async fn run(&self, program: &str, args: &[&str]) -> WarmvolResult<String> {
        self.runner.run(program, args).await
    }

    /// Run a command that needs root
    pub async fn run_privileged(&self, program: &str, args: &[&str]) -> WarmvolResult<String> {
        if self.sudo {
            let mut full = Vec::with_capacity(args.len() + 1);
            full.push(program);
            full.extend_from_slice(args);
            self.runner.run("sudo", &full).await
        } else {
            self.runner.run(program, args).await
        }
    }
}

/// Decide whether privileged commands need sudo
pub fn sudo_required(mode: SudoMode) -> bool {
    match mode {
        SudoMode::Always => true,
        SudoMode::Never => false,
        SudoMode::Auto => {
            // SAFETY: geteuid has no preconditions and cannot fail.
            let euid = unsafe { libc::geteuid() };
            euid != 0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRunner;

    #[tokio::test]
    async fn privileged_commands_get_sudo_prefix() {
        let runner = Arc::new(FakeRunner::new());
        let host = Host::new(runner.clone(), true);

        host.run_privileged("umount", &["/var/lib/docker"]).await.unwrap();
        host.run("lsblk", &["-J"]).await.unwrap();

        assert_eq!(
            runner.calls(),
            vec!["sudo umount /var/lib/docker", "lsblk -J"]
        );
    }

    #[tokio::test]
    async fn no_sudo_when_disabled() {
        let runner = Arc::new(FakeRunner::new());
        let host = Host::new(runner.clone(), false);

        host.run_privileged("mount", &["/dev/nvme1n1", "/mnt"]).await.unwrap();

        assert_eq!(runner.calls(), vec!["mount /dev/nvme1n1 /mnt"]);
    }

    #[test]
    fn sudo_modes() {
        assert!(sudo_required(SudoMode::Always));
        assert!(!sudo_required(SudoMode::Never));
    }

    #[test]
    fn auto_sudo_follows_effective_uid() {
        let root = unsafe { libc::geteuid() } == 0;
        assert_eq!(sudo_required(SudoMode::Auto), !root);
    }
}
