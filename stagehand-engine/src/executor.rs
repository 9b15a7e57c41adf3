//! Direct executor
//!
//! Runs node functions in process, one after another, in declaration order.
//! There is no dependency resolution and no compilation: the declared order
//! is the execution order. The first failure stops the run.

use stagehand_core::PipelineDefinition;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::{PipelineError, Result};

/// A local node implementation
///
/// Follows the node calling convention: an opaque context, the input and
/// output asset names, and the local flag. Returns a status string.
pub trait NodeFunction<C>: Send + Sync {
    fn call(
        &self,
        context: &C,
        inputs: &[String],
        outputs: &[String],
        is_local: bool,
    ) -> anyhow::Result<String>;
}

impl<C, F> NodeFunction<C> for F
where
    F: Fn(&C, &[String], &[String], bool) -> anyhow::Result<String> + Send + Sync,
{
    fn call(
        &self,
        context: &C,
        inputs: &[String],
        outputs: &[String],
        is_local: bool,
    ) -> anyhow::Result<String> {
        self(context, inputs, outputs, is_local)
    }
}

/// Function name to local implementation, built once at startup
pub struct NodeTable<C> {
    functions: BTreeMap<String, Arc<dyn NodeFunction<C>>>,
}

impl<C> NodeTable<C> {
    pub fn new() -> Self {
        Self {
            functions: BTreeMap::new(),
        }
    }

    /// Registers an implementation, replacing any previous one of that name
    pub fn register<N>(&mut self, name: impl Into<String>, function: N) -> &mut Self
    where
        N: NodeFunction<C> + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
        self
    }

    /// Registers a closure
    pub fn register_fn<F>(&mut self, name: impl Into<String>, function: F) -> &mut Self
    where
        F: Fn(&C, &[String], &[String], bool) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        self.register(name, function)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn NodeFunction<C>>> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl<C> Default for NodeTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Status returned by one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRun {
    pub node: String,
    pub status: String,
}

pub struct DirectExecutor;

impl DirectExecutor {
    /// Runs every node of `definition` in declaration order
    ///
    /// Missing `input_data` / `output_data` are passed as empty lists and a
    /// missing `is_local` as `true`.
    ///
    /// # Errors
    /// `UnknownFunction` when a node's function is not in `table`, or
    /// `NodeFailed` when it returns an error. Nodes after it do not run.
    pub fn run<C>(
        context: &C,
        definition: &PipelineDefinition,
        table: &NodeTable<C>,
    ) -> Result<Vec<NodeRun>> {
        let total = definition.len();
        let mut runs = Vec::with_capacity(total);

        for (idx, node) in definition.nodes().iter().enumerate() {
            let function =
                table
                    .get(&node.function.name)
                    .ok_or_else(|| PipelineError::UnknownFunction {
                        node: node.name.clone(),
                        function: node.function.name.clone(),
                    })?;

            info!("Running node {}/{}: {}", idx + 1, total, node.name);

            let params = &node.parameters;
            let status = function
                .call(
                    context,
                    params.input_data(),
                    params.output_data(),
                    params.is_local().unwrap_or(true),
                )
                .map_err(|source| {
                    error!("Node '{}' failed: {:#}", node.name, source);
                    PipelineError::NodeFailed {
                        node: node.name.clone(),
                        source,
                    }
                })?;

            info!("Node '{}' completed: {}", node.name, status);
            runs.push(NodeRun {
                node: node.name.clone(),
                status,
            });
        }

        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagehand_core::domain::definition::{INPUT_DATA, IS_LOCAL};
    use stagehand_core::{FunctionRef, NodeSpec, Value};
    use std::sync::Mutex;

    type Log = Mutex<Vec<String>>;

    fn record(name: &'static str) -> impl Fn(&Log, &[String], &[String], bool) -> anyhow::Result<String> {
        move |log: &Log, inputs: &[String], _outputs: &[String], is_local: bool| {
            log.lock()
                .unwrap()
                .push(format!("{name}:{}:{is_local}", inputs.join(",")));
            Ok("OK".to_string())
        }
    }

    fn node(name: &str, function: &str) -> NodeSpec {
        NodeSpec::new(name, FunctionRef::new(function, function))
    }

    #[test]
    fn test_runs_in_declared_order_with_defaults() {
        let mut table = NodeTable::new();
        table.register_fn("f_a", record("a")).register_fn("f_b", record("b"));

        let definition = PipelineDefinition::new()
            .with_node(node("A", "f_a").param(INPUT_DATA, Value::sequence(["housing"])))
            .with_node(node("B", "f_b").depends_on("A").param(IS_LOCAL, false));

        let log = Log::default();
        let runs = DirectExecutor::run(&log, &definition, &table).unwrap();

        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].status, "OK");
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:housing:true".to_string(), "b::false".to_string()]
        );
    }

    #[test]
    fn test_declared_order_is_not_reordered() {
        let mut table = NodeTable::new();
        table.register_fn("f_a", record("a")).register_fn("f_b", record("b"));

        // B declared first even though it depends on A
        let definition = PipelineDefinition::new()
            .with_node(node("B", "f_b").depends_on("A"))
            .with_node(node("A", "f_a"));

        let log = Log::default();
        DirectExecutor::run(&log, &definition, &table).unwrap();
        assert_eq!(log.lock().unwrap()[0], "b::true");
    }

    #[test]
    fn test_failure_stops_run() {
        let mut table: NodeTable<Log> = NodeTable::new();
        table
            .register_fn("f_a", |_: &Log, _: &[String], _: &[String], _: bool| {
                anyhow::bail!("disk full")
            })
            .register_fn("f_b", record("b"));

        let definition = PipelineDefinition::new()
            .with_node(node("A", "f_a"))
            .with_node(node("B", "f_b"));

        let log = Log::default();
        let err = DirectExecutor::run(&log, &definition, &table).unwrap_err();

        assert!(matches!(err, PipelineError::NodeFailed { ref node, .. } if node == "A"));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_function() {
        let mut table = NodeTable::new();
        table.register_fn("f_a", record("a"));

        let definition = PipelineDefinition::new()
            .with_node(node("A", "f_a"))
            .with_node(node("B", "missing"));

        let log = Log::default();
        let err = DirectExecutor::run(&log, &definition, &table).unwrap_err();

        assert!(matches!(
            err,
            PipelineError::UnknownFunction { ref node, ref function } if node == "B" && function == "missing"
        ));
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_table_lookup() {
        let mut table: NodeTable<Log> = NodeTable::default();
        assert!(table.is_empty());
        table.register_fn("train", record("t"));

        assert!(table.contains("train"));
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["train"]);
        assert!(table.get("split").is_none());
    }
}
