//! Snapshot command - fold the cache volume back into a snapshot at job end

use crate::cache::SnapshotOutput;
use crate::cli::args::{self, OutputFormat, SnapshotArgs};
use crate::cli::commands::context::{self, CacheContext};
use crate::config::Config;
use crate::error::WarmvolResult;
use crate::ui::{self, UiContext};
use serde::Serialize;

#[derive(Serialize)]
struct SnapshotJson<'a> {
    mount_point: &'a str,
    #[serde(flatten)]
    output: &'a SnapshotOutput,
}

/// Execute the snapshot command
pub async fn execute(args: SnapshotArgs, config: &Config) -> WarmvolResult<()> {
    let ctx = UiContext::detect();
    let mount_points = args::mount_points(&args.mount_points);

    let mut config = config.clone();
    if args.wait {
        config.snapshot.wait_for_completion = true;
    }

    let mut job = context::job_context(&args.job).await?;
    job.fill_instance_identity(&args.job.imds_endpoint).await?;
    let cache = CacheContext::new(&config, &job);

    if args.format == OutputFormat::Text {
        ui::intro(&ctx, "warmvol snapshot");
    }

    let mut taken = Vec::new();
    let mut first_error = None;
    let text = args.format == OutputFormat::Text;
    for mount_point in &mount_points {
        let job = context::for_mount_point(&job, mount_point, mount_points.len());
        if text {
            ui::group(&ctx, mount_point);
        }
        let result = match cache.manager(&config, job) {
            Ok(manager) => manager.snapshot(mount_point).await,
            Err(e) => Err(e),
        };
        if text {
            ui::end_group(&ctx);
        }

        match result {
            Ok(output) => taken.push((mount_point.as_str(), output)),
            Err(e) if mount_points.len() > 1 => {
                ui::step_error_detail(&ctx, mount_point, &e.to_string());
                first_error.get_or_insert(e);
            }
            Err(e) => return Err(e),
        }
    }

    match args.format {
        OutputFormat::Text => {
            for (mount_point, output) in &taken {
                ui::step_ok_detail(&ctx, &format!("{} snapshotted", mount_point), &output.snapshot_id);
            }
            if !taken.is_empty() {
                if config.snapshot.wait_for_completion {
                    ui::outro_success(&ctx, "Snapshots completed");
                } else {
                    ui::remark(&ctx, "Snapshots complete in the background");
                    ui::outro_success(&ctx, "Snapshots started");
                }
            }
        }
        OutputFormat::Json => {
            let rows: Vec<SnapshotJson> = taken
                .iter()
                .map(|(mount_point, output)| SnapshotJson {
                    mount_point,
                    output,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
