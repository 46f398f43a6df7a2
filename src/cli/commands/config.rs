//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::{WarmvolError, WarmvolResult};
use crate::ui::{self, UiContext};
use serde::de::DeserializeOwned;
use std::path::PathBuf;

const VALID_KEYS: &[&str] = &[
    "general.log_format",
    "general.state_dir",
    "volume.size_gib",
    "volume.min_size_gib",
    "volume.volume_type",
    "volume.iops",
    "volume.throughput_mbps",
    "volume.initialization_rate_mbps",
    "volume.device",
    "volume.filesystem",
    "snapshot.format_version",
    "snapshot.wait_for_completion",
    "snapshot.name_prefix",
    "service.name",
    "service.health_command",
    "service.prune_command",
    "timeouts.volume_available_secs",
    "timeouts.volume_attached_secs",
    "timeouts.snapshot_completed_secs",
    "timeouts.volume_poll_secs",
    "timeouts.snapshot_poll_secs",
    "timeouts.command_secs",
    "host.sudo",
    "host.device_resolution",
    "host.device_model",
    "aws.region",
    "aws.profile",
];

/// Execute the config command
pub async fn execute(args: ConfigArgs, manager: &ConfigManager, config: &Config) -> WarmvolResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => show_path(manager),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => set_value(manager, &key, &value).await?,
    }

    Ok(())
}

fn show_config(config: &Config) -> WarmvolResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn show_path(manager: &ConfigManager) {
    println!("{}", manager.path().display());
}

async fn init_config(manager: &ConfigManager, force: bool) -> WarmvolResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;

    ui::step_ok_detail(
        &ctx,
        "Configuration initialized",
        &path.display().to_string(),
    );

    Ok(())
}

/// Set one key in the config file, leaving command-line overrides out of it
async fn set_value(manager: &ConfigManager, key: &str, value: &str) -> WarmvolResult<()> {
    let ctx = UiContext::detect();

    let mut config = manager.load().await?;
    if let Err(e) = apply(&mut config, key, value) {
        if matches!(e, WarmvolError::User(ref msg) if msg.starts_with("Unknown config key")) {
            ui::step_error_detail(&ctx, "Unknown config key", key);
            ui::remark(&ctx, "Valid keys:");
            print_valid_keys();
        }
        return Err(e);
    }

    manager.save(&config).await?;
    ui::step_ok(&ctx, &format!("Set {} = {}", key, value));

    Ok(())
}

/// Apply a dot-separated key to `config`
fn apply(config: &mut Config, key: &str, value: &str) -> WarmvolResult<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "log_format"] => config.general.log_format = value.to_string(),
        ["general", "state_dir"] => {
            config.general.state_dir = optional(value).map(PathBuf::from)
        }

        ["volume", "size_gib"] => config.volume.size_gib = parse_u32(value)?,
        ["volume", "min_size_gib"] => config.volume.min_size_gib = parse_u32(value)?,
        ["volume", "volume_type"] => config.volume.volume_type = value.to_string(),
        ["volume", "iops"] => config.volume.iops = parse_u32(value)?,
        ["volume", "throughput_mbps"] => config.volume.throughput_mbps = parse_u32(value)?,
        ["volume", "initialization_rate_mbps"] => {
            config.volume.initialization_rate_mbps = parse_u32(value)?
        }
        ["volume", "device"] => config.volume.device = value.to_string(),
        ["volume", "filesystem"] => config.volume.filesystem = value.to_string(),

        ["snapshot", "format_version"] => config.snapshot.format_version = value.to_string(),
        ["snapshot", "wait_for_completion"] => {
            config.snapshot.wait_for_completion = parse_bool(value)?
        }
        ["snapshot", "name_prefix"] => config.snapshot.name_prefix = value.to_string(),

        ["service", "name"] => config.service.name = value.to_string(),
        ["service", "health_command"] => config.service.health_command = parse_command(value),
        ["service", "prune_command"] => config.service.prune_command = parse_command(value),

        ["timeouts", "volume_available_secs"] => {
            config.timeouts.volume_available_secs = parse_u64(value)?
        }
        ["timeouts", "volume_attached_secs"] => {
            config.timeouts.volume_attached_secs = parse_u64(value)?
        }
        ["timeouts", "snapshot_completed_secs"] => {
            config.timeouts.snapshot_completed_secs = parse_u64(value)?
        }
        ["timeouts", "volume_poll_secs"] => config.timeouts.volume_poll_secs = parse_u64(value)?,
        ["timeouts", "snapshot_poll_secs"] => {
            config.timeouts.snapshot_poll_secs = parse_u64(value)?
        }
        ["timeouts", "command_secs"] => config.timeouts.command_secs = parse_u64(value)?,

        ["host", "sudo"] => config.host.sudo = parse_enum(key, value)?,
        ["host", "device_resolution"] => config.host.device_resolution = parse_enum(key, value)?,
        ["host", "device_model"] => config.host.device_model = value.to_string(),

        ["aws", "region"] => config.aws.region = optional(value).map(String::from),
        ["aws", "profile"] => config.aws.profile = optional(value).map(String::from),

        _ => return Err(WarmvolError::User(format!("Unknown config key: {}", key))),
    }

    Ok(())
}

/// Empty string clears an optional value
fn optional(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|v| !v.is_empty())
}

/// Whitespace-separated argv; empty disables the command
fn parse_command(value: &str) -> Vec<String> {
    value.split_whitespace().map(String::from).collect()
}

fn parse_bool(value: &str) -> WarmvolResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(WarmvolError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_u32(value: &str) -> WarmvolResult<u32> {
    value
        .parse()
        .map_err(|_| WarmvolError::User(format!("Invalid number: {}", value)))
}

fn parse_u64(value: &str) -> WarmvolResult<u64> {
    value
        .parse()
        .map_err(|_| WarmvolError::User(format!("Invalid number: {}", value)))
}

/// Parse an enum value the same way the config file does
fn parse_enum<T: DeserializeOwned>(key: &str, value: &str) -> WarmvolResult<T> {
    T::deserialize(toml::Value::String(value.to_string()))
        .map_err(|e| WarmvolError::User(format!("Invalid value for {}: {}", key, e)))
}

fn print_valid_keys() {
    for key in VALID_KEYS {
        eprintln!("  {}", key);
    }
}
