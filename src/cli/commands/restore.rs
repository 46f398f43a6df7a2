//! Restore command - bring a warm cache volume online at job start

use crate::cache::{attach, RestoreOutput};
use crate::cli::args::{self, OutputFormat, RestoreArgs};
use crate::cli::commands::context::{self, CacheContext};
use crate::config::{Config, JobContext};
use crate::error::WarmvolResult;
use crate::ui::{self, UiContext};
use serde::Serialize;

#[derive(Serialize)]
struct RestoreJson<'a> {
    mount_point: &'a str,
    #[serde(flatten)]
    output: &'a RestoreOutput,
}

/// Execute the restore command
pub async fn execute(args: RestoreArgs, config: &Config) -> WarmvolResult<()> {
    let ctx = UiContext::detect();
    let mount_points = args::mount_points(&args.mount_points);

    let mut job = context::job_context(&args.job).await?;
    job.fill_instance_identity(&args.job.imds_endpoint).await?;
    let cache = CacheContext::new(config, &job);

    if args.format == OutputFormat::Text {
        ui::intro(&ctx, "warmvol restore");
    }

    let mut restored = Vec::new();
    let mut first_error = None;
    let text = args.format == OutputFormat::Text;
    for (index, mount_point) in mount_points.iter().enumerate() {
        let job = context::for_mount_point(&job, mount_point, mount_points.len());
        if text {
            ui::group(&ctx, mount_point);
        }
        let result = restore_one(&cache, config, job, mount_point, index).await;
        if text {
            ui::end_group(&ctx);
        }

        match result {
            Ok(output) => restored.push((mount_point.as_str(), output)),
            Err(e) if mount_points.len() > 1 => {
                ui::step_error_detail(&ctx, mount_point, &e.to_string());
                first_error.get_or_insert(e);
            }
            Err(e) => return Err(e),
        }
    }

    match args.format {
        OutputFormat::Text => print_text(&ctx, &restored),
        OutputFormat::Json => print_json(&restored)?,
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Restore one mount point; the `index`-th one attaches under its own device name
async fn restore_one(
    cache: &CacheContext,
    config: &Config,
    job: JobContext,
    mount_point: &str,
    index: usize,
) -> WarmvolResult<RestoreOutput> {
    let device = attach::nth_device(&config.volume.device, index)?;
    cache
        .manager(config, job)?
        .with_device(device)
        .restore(mount_point)
        .await
}

fn print_text(ctx: &UiContext, restored: &[(&str, RestoreOutput)]) {
    for (mount_point, output) in restored {
        let source = match &output.snapshot_id {
            Some(id) => format!("cloned from {}", id),
            None => "blank volume".to_string(),
        };
        ui::step_ok_detail(ctx, &format!("{} restored", mount_point), &source);
        ui::key_value(ctx, "volume", &output.volume_id);
        ui::key_value(ctx, "device", &output.device_name);
    }
    if !restored.is_empty() {
        ui::outro_success(ctx, "Cache volumes ready");
    }
}

fn print_json(restored: &[(&str, RestoreOutput)]) -> WarmvolResult<()> {
    let rows: Vec<RestoreJson> = restored
        .iter()
        .map(|(mount_point, output)| RestoreJson {
            mount_point,
            output,
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}
