//! Pipeline compiler
//!
//! Compiles a definition into one root task plus one task per node. The
//! plan is computed purely from the definition; `compile` then sends it one
//! statement at a time and stops at the first rejection, leaving earlier
//! units in place.

use stagehand_client::WarehouseSession;
use stagehand_core::graph::topological_order;
use stagehand_core::literal::invocation_args;
use stagehand_core::statement::{Invocation, Schedule};
use stagehand_core::{
    DefinitionError, Namespace, ObjectName, PipelineDefinition, RootUnit, ScheduledUnit, Statement,
};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};

/// Every unit a definition compiles into, in emission order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPipeline {
    pub pipeline: String,
    pub warehouse: String,
    pub root: RootUnit,
    /// Node units in topological order
    pub units: Vec<ScheduledUnit>,
}

impl CompiledPipeline {
    /// Create-or-replace statements, root first
    pub fn statements(&self) -> Vec<Statement> {
        std::iter::once(self.root.to_statement(&self.warehouse))
            .chain(self.units.iter().map(|u| u.to_statement(&self.warehouse)))
            .collect()
    }

    pub fn unit(&self, node: &str) -> Option<&ScheduledUnit> {
        self.units.iter().find(|u| u.node == node)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineCompiler {
    namespace: Option<Namespace>,
}

impl PipelineCompiler {
    pub fn new(namespace: Option<Namespace>) -> Self {
        Self { namespace }
    }

    pub fn namespace(&self) -> Option<&Namespace> {
        self.namespace.as_ref()
    }

    /// Computes the compiled units without touching the warehouse
    ///
    /// # Errors
    /// `DefinitionError` for an empty pipeline name or an invalid definition.
    pub fn plan(
        &self,
        pipeline: &str,
        definition: &PipelineDefinition,
        warehouse: &str,
    ) -> std::result::Result<CompiledPipeline, DefinitionError> {
        if pipeline.trim().is_empty() {
            return Err(DefinitionError::EmptyPipelineName);
        }
        let ordered = topological_order(definition)?;
        let ns = self.namespace.as_ref();

        let root = RootUnit {
            unit_name: ObjectName::root(pipeline, ns),
            schedule: Schedule::idle(),
        };

        let units = ordered
            .into_iter()
            .map(|node| {
                let runs_after = if node.is_entry() {
                    vec![root.unit_name.clone()]
                } else {
                    node.depends_on
                        .iter()
                        .map(|dep| ObjectName::task(pipeline, dep, ns))
                        .collect()
                };

                ScheduledUnit {
                    node: node.name.clone(),
                    unit_name: ObjectName::task(pipeline, &node.name, ns),
                    runs_after,
                    invocation: Invocation {
                        callable: ObjectName::procedure(pipeline, &node.function.name, ns),
                        args: invocation_args(&node.parameters),
                    },
                }
            })
            .collect();

        Ok(CompiledPipeline {
            pipeline: pipeline.to_string(),
            warehouse: warehouse.to_string(),
            root,
            units,
        })
    }

    /// Creates or replaces the root and every node unit
    ///
    /// # Errors
    /// `Definition` before any remote call; `CompilationRejected` naming the
    /// first unit the warehouse refused. Units created before it are kept.
    pub async fn compile(
        &self,
        session: &dyn WarehouseSession,
        pipeline: &str,
        definition: &PipelineDefinition,
        warehouse: &str,
    ) -> Result<CompiledPipeline> {
        let compiled = self.plan(pipeline, definition, warehouse)?;

        for statement in compiled.statements() {
            debug!("{statement}");
            session
                .execute(&statement)
                .await
                .map_err(|source| PipelineError::CompilationRejected {
                    unit: statement.target().to_string(),
                    source,
                })?;
            info!(unit = %statement.target(), "Created task");
        }

        Ok(compiled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagehand_core::domain::definition::{INPUT_DATA, IS_LOCAL, OUTPUT_DATA};
    use stagehand_core::statement::TaskBody;
    use stagehand_core::{FunctionRef, NodeSpec, Value};

    fn two_nodes() -> PipelineDefinition {
        PipelineDefinition::new()
            .with_node(NodeSpec::new("A", FunctionRef::new("f_a", "nodes.f_a")))
            .with_node(NodeSpec::new("B", FunctionRef::new("f_b", "nodes.f_b")).depends_on("A"))
    }

    #[test]
    fn test_plan_two_nodes() {
        let compiled = PipelineCompiler::default()
            .plan("p", &two_nodes(), "WH")
            .unwrap();

        assert_eq!(compiled.root.unit_name.to_string(), "START_p");
        assert_eq!(compiled.units.len(), 2);

        let a = compiled.unit("A").unwrap();
        assert_eq!(a.unit_name.to_string(), "task_p_A");
        assert_eq!(a.runs_after, vec![ObjectName::root("p", None)]);

        let b = compiled.unit("B").unwrap();
        assert_eq!(b.runs_after, vec![ObjectName::task("p", "A", None)]);
        assert_eq!(b.invocation.callable.to_string(), "p_f_b_sproc");
    }

    #[test]
    fn test_statements_start_with_root() {
        let compiled = PipelineCompiler::default()
            .plan("p", &two_nodes(), "WH")
            .unwrap();
        let statements = compiled.statements();

        assert_eq!(statements.len(), 3);
        match &statements[0] {
            Statement::CreateTask(task) => {
                assert_eq!(task.body, TaskBody::Noop);
                assert_eq!(task.schedule, Some(Schedule::idle()));
                assert!(task.after.is_empty());
            }
            other => panic!("unexpected statement {other:?}"),
        }
        assert!(statements[1..].iter().all(|s| match s {
            Statement::CreateTask(task) => task.schedule.is_none() && !task.after.is_empty(),
            _ => false,
        }));
    }

    #[test]
    fn test_invocation_args_follow_parameters() {
        let definition = PipelineDefinition::new().with_node(
            NodeSpec::new("preprocess", FunctionRef::new("preprocess_data", "h"))
                .param(INPUT_DATA, Value::sequence(["housing"]))
                .param(OUTPUT_DATA, Value::sequence(["processed_housing"]))
                .param(IS_LOCAL, true),
        );

        let compiled = PipelineCompiler::default()
            .plan("de", &definition, "WH")
            .unwrap();
        assert_eq!(
            compiled.units[0].invocation.to_string(),
            "CALL de_preprocess_data_sproc(ARRAY_CONSTRUCT('housing'), ARRAY_CONSTRUCT('processed_housing'), TRUE)"
        );
    }

    #[test]
    fn test_namespace_qualifies_every_reference() {
        let ns = Namespace::new("KEDRO", "PUBLIC");
        let compiled = PipelineCompiler::new(Some(ns))
            .plan("p", &two_nodes(), "WH")
            .unwrap();

        let b = compiled.unit("B").unwrap();
        assert_eq!(b.unit_name.to_string(), "KEDRO.PUBLIC.task_p_B");
        assert_eq!(b.runs_after[0].to_string(), "KEDRO.PUBLIC.task_p_A");
        assert_eq!(
            b.invocation.callable.to_string(),
            "KEDRO.PUBLIC.p_f_b_sproc"
        );
        assert_eq!(
            compiled.unit("A").unwrap().runs_after[0].to_string(),
            "KEDRO.PUBLIC.START_p"
        );
    }

    #[test]
    fn test_plan_rejects_empty_pipeline_name() {
        assert_eq!(
            PipelineCompiler::default().plan("", &two_nodes(), "WH"),
            Err(DefinitionError::EmptyPipelineName)
        );
    }
}
