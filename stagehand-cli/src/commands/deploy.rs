//! Deployment to the warehouse task runner

use anyhow::{Context, Result};
use colored::*;
use stagehand_client::HttpSession;
use stagehand_engine::{PipelineDeployer, TriggerOutcome};

use super::load_pipeline;
use crate::config::{Config, Settings, connection_settings, load_profile, namespace};

pub async fn deploy(config: &Config) -> Result<()> {
    let parsed = load_pipeline(config, false)?;
    let settings = Settings::load(&config.settings_path)?;

    let profile = load_profile(&config.credentials_path, &config.profile)?;
    let connection = connection_settings(profile, &config.overrides)?;
    let ns = namespace(&settings, &connection);
    let warehouse = connection.warehouse.clone();

    let session = HttpSession::new(connection).context("Failed to create warehouse session")?;
    let deployer = PipelineDeployer::new(settings.registry_config(), ns);

    let report = deployer
        .deploy(&session, &parsed.name, &parsed.definition, &warehouse)
        .await
        .with_context(|| format!("Failed to deploy pipeline '{}'", parsed.name))?;

    println!(
        "{}",
        format!("Pipeline '{}' deployed", parsed.name).green().bold()
    );
    println!("  Procedures:  {}", report.procedures.len());
    println!("  Tasks:       {}", report.compiled.units.len() + 1);
    match &report.outcome {
        TriggerOutcome::Forced(units) => {
            for unit in units {
                println!("  {} Triggered {}", "▸".cyan(), unit.to_string().bold());
            }
        }
        TriggerOutcome::Fallback {
            rejected_unit,
            reason,
        } => {
            println!(
                "  {} Force run of {} rejected ({}), executed {}",
                "▸".yellow(),
                rejected_unit.to_string().bold(),
                reason.dimmed(),
                report.compiled.root.unit_name.to_string().bold()
            );
        }
    }
    Ok(())
}
