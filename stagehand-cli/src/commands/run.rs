//! Local run
//!
//! Nodes run sequentially in declaration order through their configured
//! commands.

use anyhow::{Context, Result};
use colored::*;
use stagehand_core::DataCatalogue;
use stagehand_engine::DirectExecutor;
use tracing::info;

use super::load_pipeline;
use crate::config::{Config, Settings};
use crate::nodes::{NodeContext, node_table};

pub async fn run_local(config: &Config) -> Result<()> {
    let parsed = load_pipeline(config, true)?;
    let settings = Settings::load(&config.settings_path)?;
    let catalogue = DataCatalogue::load(&config.catalogue_path).with_context(|| {
        format!(
            "Failed to load data catalogue {}",
            config.catalogue_path.display()
        )
    })?;

    let table = node_table(&settings.nodes);
    let context = NodeContext {
        catalogue,
        workdir: std::env::current_dir().context("Failed to read working directory")?,
    };

    info!(
        "Running pipeline '{}' locally ({} nodes)",
        parsed.name,
        parsed.definition.len()
    );

    let definition = parsed.definition;
    let runs = tokio::task::spawn_blocking(move || {
        DirectExecutor::run(&context, &definition, &table)
    })
    .await
    .context("Local run was interrupted")??;

    println!(
        "{}",
        format!("Pipeline '{}' completed:", parsed.name).green().bold()
    );
    for run in runs {
        println!("  {} {} {}", "▸".cyan(), run.node.bold(), run.status.dimmed());
    }
    Ok(())
}
