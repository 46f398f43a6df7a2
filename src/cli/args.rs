//! CLI argument definitions using clap derive

use crate::cloud::Tag;
use crate::config::imds;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Mount point cached when none is given
pub const DEFAULT_MOUNT_POINT: &str = "/var/lib/docker";

/// warmvol - branch-scoped cache volumes for CI runners
///
/// Restores a warm block-storage volume at job start and folds it back
/// into a snapshot at job end.
#[derive(Parser, Debug)]
#[command(name = "warmvol")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "WARMVOL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding volume info records
    #[arg(long, global = true, env = "WARMVOL_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Log line format (overrides general.log_format)
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Provision, attach and mount a cache volume (job start)
    Restore(RestoreArgs),

    /// Snapshot the cache volume and release it (job end)
    Snapshot(SnapshotArgs),

    /// Show which snapshot the next restore would clone
    Locate(LocateArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Identity of the job, from flags or the runner environment
#[derive(Args, Debug, Clone)]
pub struct JobArgs {
    /// Repository as owner/name
    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub repository: Option<String>,

    /// Git ref the job runs for (e.g. refs/heads/main)
    #[arg(long = "ref", env = "GITHUB_REF")]
    pub git_ref: Option<String>,

    /// Branch whose cache is used when the job's branch has none
    #[arg(long, env = "WARMVOL_DEFAULT_BRANCH")]
    pub default_branch: Option<String>,

    /// EC2 instance id (looked up from instance metadata if omitted)
    #[arg(long, env = "WARMVOL_INSTANCE_ID")]
    pub instance_id: Option<String>,

    /// Availability zone (looked up from instance metadata if omitted)
    #[arg(long, env = "WARMVOL_AVAILABILITY_ZONE")]
    pub availability_zone: Option<String>,

    /// Extra cache tag (KEY=VALUE, repeatable)
    #[arg(short, long = "tag", value_parser = parse_tag)]
    pub tags: Vec<Tag>,

    /// Runner config JSON with defaultBranch and customTags
    #[arg(long, env = "RUNS_ON_CONFIG")]
    pub runner_config: Option<PathBuf>,

    /// Instance metadata endpoint
    #[arg(long, env = "WARMVOL_IMDS_ENDPOINT", default_value = imds::DEFAULT_ENDPOINT)]
    pub imds_endpoint: String,
}

/// Arguments for the restore command
#[derive(Parser, Debug)]
pub struct RestoreArgs {
    #[command(flatten)]
    pub job: JobArgs,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Mount points to cache (defaults to /var/lib/docker)
    pub mount_points: Vec<String>,
}

/// Arguments for the snapshot command
#[derive(Parser, Debug)]
pub struct SnapshotArgs {
    #[command(flatten)]
    pub job: JobArgs,

    /// Wait for the snapshot to complete (overrides snapshot.wait_for_completion)
    #[arg(long)]
    pub wait: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Mount points to snapshot (defaults to /var/lib/docker)
    pub mount_points: Vec<String>,
}

/// Arguments for the locate command
#[derive(Parser, Debug)]
pub struct LocateArgs {
    #[command(flatten)]
    pub job: JobArgs,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Mount points to look up (defaults to /var/lib/docker)
    pub mount_points: Vec<String>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., volume.size_gib)
        key: String,
        /// Value to set
        value: String,
    },
}

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines
    Text,
    /// JSON output
    Json,
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Parse `general.log_format`, treating anything unknown as text
    pub fn from_config(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Resolve the mount points of a command, applying the default
pub fn mount_points(given: &[String]) -> Vec<String> {
    if given.is_empty() {
        vec![DEFAULT_MOUNT_POINT.to_string()]
    } else {
        given.to_vec()
    }
}

/// Parse a cache tag in KEY=VALUE format
fn parse_tag(s: &str) -> Result<Tag, String> {
    Tag::parse(s).ok_or_else(|| format!("invalid KEY=VALUE tag: '{s}'"))
}
