//! Filesystem and mount-table operations on block devices

use crate::error::{WarmvolError, WarmvolResult};
use crate::host::Host;
use tracing::{debug, info};

/// Force flag for `mkfs.<fs>`: xfs spells it differently from ext*.
fn force_flag(filesystem: &str) -> &'static str {
    if filesystem == "xfs" {
        "-f"
    } else {
        "-F"
    }
}

/// Create a filesystem on `device`, overwriting any stale superblock
pub async fn format(host: &Host, device: &str, filesystem: &str) -> WarmvolResult<()> {
    let mkfs = format!("mkfs.{}", filesystem);
    info!(device, filesystem, "Formatting device");

    host.run_privileged(&mkfs, &[force_flag(filesystem), device])
        .await
        .map_err(|e| WarmvolError::FormatFailed {
            device: device.to_string(),
            reason: e.to_string(),
        })?;
    Ok(())
}

/// Create the mount point directory if needed
pub async fn ensure_dir(host: &Host, path: &str) -> WarmvolResult<()> {
    debug!("Creating mount point {} if it doesn't exist", path);
    host.run_privileged("mkdir", &["-p", path]).await?;
    Ok(())
}

/// Mount `device` at `mount_point`
pub async fn mount(host: &Host, device: &str, mount_point: &str) -> WarmvolResult<()> {
    host.run_privileged("mount", &[device, mount_point])
        .await
        .map_err(|e| WarmvolError::MountFailed {
            device: device.to_string(),
            mount_point: mount_point.to_string(),
            reason: e.to_string(),
        })?;
    Ok(())
}

/// Unmount `mount_point`
pub async fn unmount(host: &Host, mount_point: &str) -> WarmvolResult<()> {
    host.run_privileged("umount", &[mount_point])
        .await
        .map_err(|e| WarmvolError::UnmountFailed {
            mount_point: mount_point.to_string(),
            reason: e.to_string(),
        })?;
    Ok(())
}

/// Unmount `mount_point` if something is mounted there.
///
/// Returns whether an unmount was attempted. An unreadable mount table is
/// treated as "maybe mounted".
pub async fn unmount_if_mounted(host: &Host, mount_point: &str) -> WarmvolResult<bool> {
    match is_mounted(host, mount_point).await {
        Ok(false) => {
            debug!("{} is not mounted", mount_point);
            return Ok(false);
        }
        Ok(true) => {}
        Err(e) => debug!("Could not read mount table for {}: {}", mount_point, e),
    }
    info!(mount_point, "Unmounting");
    unmount(host, mount_point).await?;
    Ok(true)
}

/// Check the mount table for `mount_point`
pub async fn is_mounted(host: &Host, mount_point: &str) -> WarmvolResult<bool> {
    let output = host.run("df", &[mount_point]).await?;
    Ok(df_reports_mount(&output, mount_point))
}

/// Whether `df <path>` output shows a filesystem mounted exactly at `mount_point`.
///
/// `df` on a plain directory reports the parent filesystem, so the
/// "Mounted on" column has to match exactly.
pub fn df_reports_mount(df_output: &str, mount_point: &str) -> bool {
    let wanted = mount_point.trim_end_matches('/');
    df_output
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().last())
        .any(|mounted_on| mounted_on == wanted)
}
