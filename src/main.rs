//! actioncache - Action Cache access pipelines
//!
//! CLI entry point that dispatches to subcommands.

use actioncache::cli::{Cli, Commands};
use actioncache::config::ConfigManager;
use actioncache::error::ActionCacheResult;
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
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

/// Initialize logging: 0 = warn, 1 = info, 2+ = debug
fn init_logging(verbose: u8, log_format: &str) {
    let filter = match verbose {
        0 => EnvFilter::new("actioncache=warn"),
        1 => EnvFilter::new("actioncache=info"),
        _ => EnvFilter::new("actioncache=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}

async fn run() -> ActionCacheResult<()> {
    let cli = Cli::parse();

    let manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    // Config command must work even when the file is broken
    if let Commands::Config(args) = cli.command {
        init_logging(cli.verbose, "text");
        return actioncache::cli::commands::config(args, &manager).await;
    }

    let config = manager.load().await?;
    init_logging(cli.verbose, &config.general.log_format);

    match cli.command {
        Commands::Config(_) => unreachable!("Config handled above"),
        Commands::Check(args) => actioncache::cli::commands::check(args, &manager, &config).await,
        Commands::Get(args) => actioncache::cli::commands::get(args, &config).await,
    }
}
