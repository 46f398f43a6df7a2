//! warmvol - branch-scoped cache volumes for CI runners
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use warmvol::cli::args::LogFormat;
use warmvol::cli::{commands, Cli, Commands};
use warmvol::config::ConfigManager;
use warmvol::error::{WarmvolError, WarmvolResult};

#[tokio::main]
async fn main() -> ExitCode {
    let result = tokio::select! {
        result = run() => result,
        Ok(()) = tokio::signal::ctrl_c() => {
            warn!("Interrupted, in-flight cloud operations are not rolled back");
            Err(WarmvolError::Interrupted)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> WarmvolResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let mut config = config_manager.load().await?;
    if let Some(dir) = cli.state_dir {
        config.general.state_dir = Some(dir);
    }

    init_logging(
        cli.verbose,
        cli.log_format
            .unwrap_or_else(|| LogFormat::from_config(&config.general.log_format)),
    );

    match cli.command {
        Commands::Restore(args) => commands::restore(args, &config).await,
        Commands::Snapshot(args) => commands::snapshot(args, &config).await,
        Commands::Locate(args) => commands::locate(args, &config).await,
        Commands::Config(args) => commands::config(args, &config_manager, &config).await,
    }
}

/// 0 = info, 1 = debug, 2+ = trace; RUST_LOG takes precedence
fn init_logging(verbose: u8, format: LogFormat) {
    let default = match verbose {
        0 => "warmvol=info",
        1 => "warmvol=debug",
        _ => "warmvol=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
