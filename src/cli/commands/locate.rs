//! Locate command - show which snapshot the next restore would clone
//!
//! Read-only: needs the job's repository and ref but no instance identity.

use crate::cache::{CacheKey, Located, SnapshotLocator};
use crate::cli::args::{self, LocateArgs, OutputFormat};
use crate::cli::commands::context::{self, CacheContext};
use crate::config::Config;
use crate::error::WarmvolResult;
use crate::ui::{self, UiContext};
use serde::Serialize;

#[derive(Serialize)]
struct LocateJson {
    mount_point: String,
    branch: String,
    default_branch: Option<String>,
    snapshot_id: Option<String>,
    snapshot_start_time: Option<String>,
    volume_size_gib: Option<u32>,
    from_default_branch: bool,
}

/// Execute the locate command
pub async fn execute(args: LocateArgs, config: &Config) -> WarmvolResult<()> {
    let ctx = UiContext::detect();
    let mount_points = args::mount_points(&args.mount_points);

    let job = context::job_context(&args.job).await?;
    let cache = CacheContext::new(config, &job);
    let locator = SnapshotLocator::new(cache.storage.clone(), config.volume.min_size_gib);
    let format_version = &config.snapshot.format_version;

    let mut rows = Vec::new();
    for mount_point in &mount_points {
        let job = context::for_mount_point(&job, mount_point, mount_points.len());
        let key = CacheKey::for_job(&job, format_version);
        let default_key = CacheKey::for_default_branch(&job, format_version);
        let located = locator.locate(&key, default_key.as_ref()).await?;

        rows.push(LocateJson {
            mount_point: mount_point.clone(),
            branch: key.branch_ref.clone(),
            default_branch: default_key.map(|k| k.branch_ref),
            snapshot_id: located.as_ref().map(|l| l.snapshot.id.clone()),
            snapshot_start_time: located.as_ref().map(|l| l.snapshot.start_time.to_rfc3339()),
            volume_size_gib: located.as_ref().map(|l| l.snapshot.volume_size_gib),
            from_default_branch: located.as_ref().is_some_and(|l| l.from_default_branch),
        });

        if args.format == OutputFormat::Text {
            print_text(&ctx, mount_point, &key, located.as_ref());
        }
    }

    if args.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    }

    Ok(())
}

fn print_text(ctx: &UiContext, mount_point: &str, key: &CacheKey, located: Option<&Located>) {
    ui::step_info(ctx, &format!("{} ({})", mount_point, key.branch_tag()));
    for tag in key.tags() {
        ui::key_value(ctx, &tag.key, &tag.value);
    }

    match located {
        Some(l) => {
            let origin = if l.from_default_branch {
                "default branch"
            } else {
                "own branch"
            };
            ui::step_ok_detail(
                ctx,
                &format!("Would clone {}", l.snapshot.id),
                &format!(
                    "{}, {} GiB, started {}",
                    origin,
                    l.snapshot.volume_size_gib,
                    l.snapshot.start_time.format("%Y-%m-%d %H:%M:%S UTC")
                ),
            );
        }
        None => ui::step_warn_hint(
            ctx,
            "No usable snapshot",
            "the next restore starts from a blank volume",
        ),
    }
}
