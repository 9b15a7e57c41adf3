//! Local node functions
//!
//! Each configured function name maps to an external command. The command
//! receives resolved asset locations as `--input name=path` and
//! `--output name=path`, plus `--local` when running locally.

use anyhow::{Context, Result, bail};
use stagehand_core::DataCatalogue;
use stagehand_engine::{NodeFunction, NodeTable};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

use crate::config::CommandSpec;

/// What every local node function gets to see
#[derive(Debug, Clone)]
pub struct NodeContext {
    pub catalogue: DataCatalogue,
    /// Working directory the commands run in
    pub workdir: PathBuf,
}

pub struct CommandNode {
    spec: CommandSpec,
}

impl CommandNode {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }

    fn asset_args(
        context: &NodeContext,
        flag: &str,
        assets: &[String],
        is_local: bool,
    ) -> Result<Vec<String>> {
        let mut args = Vec::with_capacity(assets.len() * 2);
        for asset in assets {
            let location = context
                .catalogue
                .resolve(asset, is_local)
                .with_context(|| format!("Cannot resolve asset '{asset}'"))?;
            args.push(flag.to_string());
            args.push(format!("{asset}={location}"));
        }
        Ok(args)
    }
}

impl NodeFunction<NodeContext> for CommandNode {
    fn call(
        &self,
        context: &NodeContext,
        inputs: &[String],
        outputs: &[String],
        is_local: bool,
    ) -> Result<String> {
        let mut command = Command::new(&self.spec.program);
        command
            .args(&self.spec.args)
            .args(Self::asset_args(context, "--input", inputs, is_local)?)
            .args(Self::asset_args(context, "--output", outputs, is_local)?)
            .current_dir(&context.workdir);
        if is_local {
            command.arg("--local");
        }

        debug!("Spawning {:?}", command);
        let output = command
            .output()
            .with_context(|| format!("Failed to execute '{}'", self.spec.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "'{}' exited with {}: {}",
                self.spec.program,
                output.status,
                stderr.trim()
            );
        }
        Ok("OK".to_string())
    }
}

/// Builds the node table from the configured commands
pub fn node_table(commands: &BTreeMap<String, CommandSpec>) -> NodeTable<NodeContext> {
    let mut table = NodeTable::new();
    for (function, spec) in commands {
        table.register(function.clone(), CommandNode::new(spec.clone()));
    }
    table
}
