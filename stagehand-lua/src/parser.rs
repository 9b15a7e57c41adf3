//! Pipeline definition parser
//!
//! Evaluates a Lua pipeline file in the sandbox and converts the returned
//! table into a [`PipelineDefinition`]. Only the shape is checked here;
//! graph rules (dangling dependencies, cycles) are enforced by
//! `stagehand_core::graph` before anything is compiled.

use anyhow::{Context, Result, anyhow, bail};
use mlua::{Table, Value as LuaValue};
use stagehand_core::literal::CANONICAL_PARAMETERS;
use stagehand_core::{FunctionRef, NodeSpec, Parameters, PipelineDefinition, Value};
use std::path::Path;

use crate::module::ModuleRegistry;
use crate::sandbox::create_sandbox;

/// A pipeline definition file after evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPipeline {
    pub name: String,
    pub definition: PipelineDefinition,
}

/// Parse a pipeline definition from Lua source code
///
/// # Arguments
/// * `source` - The Lua source code, which must return the pipeline table
/// * `modules` - Host modules registered into the sandbox before evaluation
///
/// # Errors
/// Returns an error if the source does not evaluate, if `name` or `nodes` are
/// missing, or if a node field has the wrong type. Messages name the
/// offending node and field.
///
/// # Example
/// ```no_run
/// use stagehand_lua::{ModuleRegistry, parse_pipeline};
///
/// let source = r#"
///     return pipeline.define {
///         name = "de_pipeline",
///         nodes = {
///             pipeline.node { name = "preprocess", func = "preprocess_data",
///                 params = { input_data = {"housing"}, output_data = {"processed_housing"} } },
///         },
///     }
/// "#;
///
/// let parsed = parse_pipeline(source, &ModuleRegistry::new())?;
/// assert_eq!(parsed.definition.len(), 1);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn parse_pipeline(source: &str, modules: &ModuleRegistry) -> Result<ParsedPipeline> {
    let lua = create_sandbox().context("Failed to create definition sandbox")?;
    modules
        .register_all(&lua)
        .context("Failed to register definition modules")?;

    let pipeline: Table = lua
        .load(source)
        .eval()
        .context("Failed to evaluate pipeline definition")?;

    let name: String = pipeline
        .get("name")
        .context("Pipeline must have a 'name' field")?;
    if name.trim().is_empty() {
        bail!("Pipeline 'name' cannot be empty");
    }

    let nodes: Table = pipeline
        .get("nodes")
        .context("Pipeline must have a 'nodes' field")?;

    let mut definition = PipelineDefinition::new();
    for (i, entry) in nodes.sequence_values::<Table>().enumerate() {
        let table = entry.with_context(|| format!("Node #{} must be a table", i + 1))?;
        definition.push(parse_node(i + 1, &table)?);
    }

    Ok(ParsedPipeline { name, definition })
}

/// Read and parse a pipeline definition file
pub fn parse_pipeline_file(path: &Path, modules: &ModuleRegistry) -> Result<ParsedPipeline> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pipeline file {}", path.display()))?;
    parse_pipeline(&source, modules)
        .with_context(|| format!("Invalid pipeline file {}", path.display()))
}

fn parse_node(position: usize, table: &Table) -> Result<NodeSpec> {
    let name: String = table
        .get("name")
        .with_context(|| format!("Node #{position} must have a 'name' field"))?;

    let func: String = table
        .get("func")
        .with_context(|| format!("Node '{name}' must have a 'func' field"))?;

    let handler: Option<String> = table
        .get("handler")
        .with_context(|| format!("Field 'handler' of node '{name}' must be a string"))?;

    let mut node = NodeSpec::new(
        name.clone(),
        FunctionRef::new(func.clone(), handler.unwrap_or(func)),
    );

    match table.get::<LuaValue>("depends_on")? {
        LuaValue::Nil => {}
        LuaValue::Table(deps) => {
            for dep in deps.sequence_values::<String>() {
                let dep = dep.with_context(|| {
                    format!("Field 'depends_on' of node '{name}' must be a list of node names")
                })?;
                node = node.depends_on(dep);
            }
        }
        other => bail!(
            "Field 'depends_on' of node '{name}' must be a list of node names, got {}",
            other.type_name()
        ),
    }

    match table.get::<LuaValue>("params")? {
        LuaValue::Nil => {}
        LuaValue::Table(params) => node.parameters = parse_params(&name, &params)?,
        other => bail!(
            "Field 'params' of node '{name}' must be a table, got {}",
            other.type_name()
        ),
    }

    Ok(node)
}

/// Converts a Lua params table, ordering keys deterministically
///
/// Lua tables carry no key order, so the canonical parameters come first in
/// their fixed order and the rest follow sorted by key.
fn parse_params(node: &str, table: &Table) -> Result<Parameters> {
    let mut entries: Vec<(String, Value)> = Vec::new();
    for pair in table.pairs::<String, LuaValue>() {
        let (key, value) =
            pair.with_context(|| format!("Params of node '{node}' must use string keys"))?;
        let value = convert_value(&value)
            .with_context(|| format!("Invalid value for param '{key}' of node '{node}'"))?;
        entries.push((key, value));
    }

    entries.sort_by(|(a, _), (b, _)| {
        let rank = |k: &str| {
            CANONICAL_PARAMETERS
                .iter()
                .position(|c| *c == k)
                .unwrap_or(CANONICAL_PARAMETERS.len())
        };
        rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
    });

    let mut params = Parameters::new();
    for (key, value) in entries {
        params.insert(key, value);
    }
    Ok(params)
}

fn convert_value(value: &LuaValue) -> Result<Value> {
    match value {
        LuaValue::Boolean(b) => Ok(Value::Bool(*b)),
        LuaValue::String(s) => Ok(Value::String(s.to_str()?.to_string())),
        LuaValue::Integer(i) => Ok(Value::String(i.to_string())),
        LuaValue::Number(n) => Ok(Value::String(n.to_string())),
        LuaValue::Table(items) => {
            let mut seq = Vec::new();
            for item in items.sequence_values::<LuaValue>() {
                match item? {
                    LuaValue::String(s) => seq.push(s.to_str()?.to_string()),
                    other => {
                        return Err(anyhow!(
                            "list items must be strings, got {}",
                            other.type_name()
                        ));
                    }
                }
            }
            let keys = items.pairs::<LuaValue, LuaValue>().count();
            if keys != seq.len() {
                bail!("expected a list of strings, got a table with named keys");
            }
            Ok(Value::Sequence(seq))
        }
        other => Err(anyhow!(
            "expected a string, boolean or list of strings, got {}",
            other.type_name()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::{EnvModule, StaticVars};
    use stagehand_core::domain::definition::{INPUT_DATA, IS_LOCAL, OUTPUT_DATA};
    use std::io::Write;

    const HOUSING: &str = r#"
        return pipeline.define {
            name = "de_pipeline",
            nodes = {
                pipeline.node {
                    name = "preprocess",
                    func = "preprocess_data",
                    handler = "de_pipeline.nodes.preprocess_data.preprocess_data",
                    params = {
                        input_data = {"housing"},
                        output_data = {"processed_housing"},
                        is_local = env.flag("is_local"),
                    },
                },
                pipeline.node {
                    name = "process",
                    func = "process_data",
                    depends_on = {"preprocess"},
                    params = { input_data = {"processed_housing"}, output_data = {"model_input"} },
                },
            },
        }
    "#;

    fn env(is_local: &str) -> ModuleRegistry {
        ModuleRegistry::new().with(EnvModule::new(StaticVars::new().with("is_local", is_local)))
    }

    #[test]
    fn test_parse_housing_pipeline() {
        let parsed = parse_pipeline(HOUSING, &env("true")).unwrap();
        assert_eq!(parsed.name, "de_pipeline");

        let nodes = parsed.definition.nodes();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].name, "preprocess");
        assert_eq!(
            nodes[0].function.handler,
            "de_pipeline.nodes.preprocess_data.preprocess_data"
        );
        assert_eq!(nodes[0].parameters.input_data(), ["housing".to_string()]);
        assert_eq!(nodes[0].parameters.is_local(), Some(true));

        assert_eq!(nodes[1].depends_on, vec!["preprocess"]);
        assert_eq!(nodes[1].function.handler, "process_data");
    }

    #[test]
    fn test_params_are_ordered_canonically() {
        let source = r#"
            return pipeline.define {
                name = "p",
                nodes = {
                    { name = "a", func = "f",
                      params = { zeta = "z", is_local = false, alpha = "a",
                                 output_data = {"o"}, input_data = {"i"} } },
                },
            }
        "#;

        let parsed = parse_pipeline(source, &ModuleRegistry::new()).unwrap();
        let keys: Vec<&str> = parsed.definition.nodes()[0]
            .parameters
            .iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![INPUT_DATA, OUTPUT_DATA, IS_LOCAL, "alpha", "zeta"]);
    }

    #[test]
    fn test_builder_definition() {
        let source = r#"
            return pipeline.builder()
                :name("ds_pipeline")
                :node(pipeline.node { name = "split", func = "split_data" })
                :node(pipeline.node { name = "train", func = "train_model", depends_on = {"split"} })
                :build()
        "#;

        let parsed = parse_pipeline(source, &ModuleRegistry::new()).unwrap();
        assert_eq!(parsed.name, "ds_pipeline");
        assert_eq!(parsed.definition.len(), 2);
        assert_eq!(parsed.definition.nodes()[1].depends_on, vec!["split"]);
    }

    #[test]
    fn test_missing_name() {
        let result = parse_pipeline("return { nodes = {} }", &ModuleRegistry::new());
        assert!(result.unwrap_err().to_string().contains("name"));

        let result = parse_pipeline(r#"return { name = " ", nodes = {} }"#, &ModuleRegistry::new());
        assert!(result.unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_missing_nodes() {
        let result = parse_pipeline(r#"return { name = "p" }"#, &ModuleRegistry::new());
        assert!(result.unwrap_err().to_string().contains("nodes"));
    }

    #[test]
    fn test_node_errors_name_the_field() {
        let missing_func = r#"return { name = "p", nodes = { { name = "a" } } }"#;
        let err = parse_pipeline(missing_func, &ModuleRegistry::new()).unwrap_err();
        assert!(err.to_string().contains("'func'"));
        assert!(err.to_string().contains("'a'"));

        let bad_deps = r#"return { name = "p", nodes = { { name = "a", func = "f", depends_on = "b" } } }"#;
        let err = parse_pipeline(bad_deps, &ModuleRegistry::new()).unwrap_err();
        assert!(err.to_string().contains("depends_on"));

        let bad_param = r#"return { name = "p", nodes = { { name = "a", func = "f", params = { input_data = { true } } } } }"#;
        let err = parse_pipeline(bad_param, &ModuleRegistry::new()).unwrap_err();
        assert!(err.to_string().contains("input_data"));
    }

    #[test]
    fn test_map_param_is_not_a_list() {
        let map_param = r#"return { name = "p", nodes = { { name = "a", func = "f", params = { input_data = { a = "x" } } } } }"#;
        let err = parse_pipeline(map_param, &ModuleRegistry::new()).unwrap_err();
        assert!(format!("{err:#}").contains("named keys"));
        assert!(err.to_string().contains("input_data"));

        let mixed = r#"return { name = "p", nodes = { { name = "a", func = "f", params = { input_data = { "x", extra = "y" } } } } }"#;
        assert!(parse_pipeline(mixed, &ModuleRegistry::new()).is_err());

        let empty = r#"return { name = "p", nodes = { { name = "a", func = "f", params = { input_data = {} } } } }"#;
        let parsed = parse_pipeline(empty, &ModuleRegistry::new()).unwrap();
        assert_eq!(
            parsed.definition.nodes()[0].parameters.get(INPUT_DATA),
            Some(&Value::Sequence(Vec::new()))
        );
    }

    #[test]
    fn test_env_is_unavailable_without_module() {
        let result = parse_pipeline(HOUSING, &ModuleRegistry::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_invalid_lua() {
        assert!(parse_pipeline("this is not valid lua!!!", &ModuleRegistry::new()).is_err());
        assert!(parse_pipeline(r#"return "not a table""#, &ModuleRegistry::new()).is_err());
    }

    #[test]
    fn test_parse_pipeline_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(HOUSING.as_bytes()).unwrap();

        let parsed = parse_pipeline_file(file.path(), &env("false")).unwrap();
        assert_eq!(parsed.definition.nodes()[0].parameters.is_local(), Some(false));

        let missing = parse_pipeline_file(Path::new("/nonexistent/pipeline.lua"), &env("false"));
        assert!(missing.is_err());
    }
}
