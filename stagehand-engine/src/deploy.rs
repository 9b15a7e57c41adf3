//! Deployment
//!
//! Validate, register every node function, compile, trigger. Each step
//! completes before the next starts, and validation runs before anything is
//! sent, so an invalid definition never reaches the warehouse.

use stagehand_client::WarehouseSession;
use stagehand_core::{Namespace, ObjectName, PipelineDefinition};
use tracing::info;

use crate::compiler::{CompiledPipeline, PipelineCompiler};
use crate::error::Result;
use crate::registry::{NodeRegistry, RegistryConfig};
use crate::trigger::{PipelineTrigger, TriggerOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    pub procedures: Vec<ObjectName>,
    pub compiled: CompiledPipeline,
    pub outcome: TriggerOutcome,
}

pub struct PipelineDeployer {
    registry: NodeRegistry,
    compiler: PipelineCompiler,
    trigger: PipelineTrigger,
    namespace: Option<Namespace>,
}

impl PipelineDeployer {
    pub fn new(config: RegistryConfig, namespace: Option<Namespace>) -> Self {
        Self {
            registry: NodeRegistry::new(config),
            compiler: PipelineCompiler::new(namespace.clone()),
            trigger: PipelineTrigger::new(namespace.clone()),
            namespace,
        }
    }

    pub async fn deploy(
        &self,
        session: &dyn WarehouseSession,
        pipeline: &str,
        definition: &PipelineDefinition,
        warehouse: &str,
    ) -> Result<DeployReport> {
        // Nothing is sent for an invalid definition or pipeline name
        self.compiler.plan(pipeline, definition, warehouse)?;

        info!(pipeline = %pipeline, nodes = definition.len(), "Deploying pipeline");

        let procedures = self
            .registry
            .register_all(session, pipeline, definition, self.namespace.as_ref())
            .await?;
        let compiled = self
            .compiler
            .compile(session, pipeline, definition, warehouse)
            .await?;
        let outcome = self.trigger.trigger(session, pipeline, definition).await?;

        info!(pipeline = %pipeline, "Pipeline deployed");
        Ok(DeployReport {
            procedures,
            compiled,
            outcome,
        })
    }
}
