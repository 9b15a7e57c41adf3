//! Command handlers
//!
//! `run_local` evaluates the definition and runs it in process;
//! `deploy` registers, compiles and triggers it on the warehouse.

mod deploy;
mod run;

pub use deploy::deploy;
pub use run::run_local;

use anyhow::Result;
use stagehand_lua::{EnvModule, LogModule, ModuleRegistry, ParsedPipeline, StaticVars, parse_pipeline_file};

use crate::config::Config;

/// Evaluates the configured pipeline file
///
/// The definition sees `is_local` plus every `STAGEHAND_VAR_*` value through
/// its `env` module. Every node's `is_local` parameter is then set to
/// `is_local`.
pub(crate) fn load_pipeline(config: &Config, is_local: bool) -> Result<ParsedPipeline> {
    let vars: StaticVars = config
        .definition_vars
        .clone()
        .into_iter()
        .chain([("is_local".to_string(), is_local.to_string())])
        .collect();
    let modules = ModuleRegistry::new()
        .with(EnvModule::new(vars))
        .with(LogModule::new());

    let mut parsed = parse_pipeline_file(&config.pipeline_path, &modules)?;
    parsed.definition.set_local(is_local);
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagehand_core::Value;
    use std::collections::BTreeMap;

    const PIPELINE: &str = r#"
return pipeline.define {
  name = "de_" .. env.get("target", "dev"),
  nodes = {
    pipeline.node { name = "preprocess", func = "preprocess_data",
      params = { input_data = {"housing"}, is_local = env.flag("is_local") } },
  },
}
"#;

    fn config(dir: &std::path::Path, vars: &[(&str, &str)]) -> Config {
        let path = dir.join("pipeline.lua");
        std::fs::write(&path, PIPELINE).unwrap();
        let mut vars: BTreeMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        vars.insert("STAGEHAND_PIPELINE".to_string(), path.display().to_string());
        Config::from_vars(&vars).unwrap()
    }

    #[test]
    fn test_local_flag_reaches_definition() {
        let dir = tempfile::tempdir().unwrap();
        let parsed = load_pipeline(&config(dir.path(), &[]), true).unwrap();

        assert_eq!(parsed.name, "de_dev");
        let node = parsed.definition.get("preprocess").unwrap();
        assert_eq!(node.parameters.is_local(), Some(true));
        assert_eq!(node.parameters.input_data(), ["housing".to_string()]);
    }

    #[test]
    fn test_deploy_forces_remote_and_forwards_vars() {
        let dir = tempfile::tempdir().unwrap();
        let parsed =
            load_pipeline(&config(dir.path(), &[("STAGEHAND_VAR_TARGET", "prod")]), false).unwrap();

        assert_eq!(parsed.name, "de_prod");
        let node = parsed.definition.get("preprocess").unwrap();
        assert_eq!(node.parameters.get("is_local"), Some(&Value::Bool(false)));
    }
}
