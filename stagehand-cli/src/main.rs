//! Stagehand CLI
//!
//! Runs the configured pipeline in process with `--local`, or deploys it to
//! the warehouse task runner and triggers it otherwise.

mod commands;
mod config;
mod logging;
mod nodes;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "stagehand")]
#[command(about = "Declarative pipeline runner and task graph deployer", long_about = None)]
struct Cli {
    /// Run every node in process instead of deploying
    #[arg(long)]
    local: bool,

    /// Verbose logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.debug);

    let config = Config::from_env()?;
    config.validate()?;
    info!(
        "Loaded configuration: pipeline={}, profile={}",
        config.pipeline_path.display(),
        config.profile
    );

    if cli.local {
        commands::run_local(&config).await
    } else {
        commands::deploy(&config).await
    }
}
