//! Pipeline trigger
//!
//! Requests execution of a compiled pipeline by force-running the unit of
//! every entry node. When the first force-run is refused, the trigger falls
//! back to starting the whole graph through its root: enable dependents,
//! resume, execute. Once an entry unit has been forced the root is never
//! executed, since its cascade would run that entry a second time; a later
//! refusal is reported as an error instead.

use stagehand_client::WarehouseSession;
use stagehand_core::graph::validate;
use stagehand_core::{Namespace, ObjectName, PipelineDefinition, Statement};
use tracing::{info, warn};

use crate::error::{PipelineError, Result};

/// What the trigger ended up requesting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Every entry unit was force-run, in definition order
    Forced(Vec<ObjectName>),
    /// A force-run was refused and the root was executed instead
    Fallback {
        rejected_unit: ObjectName,
        reason: String,
    },
}

impl TriggerOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self, TriggerOutcome::Fallback { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineTrigger {
    namespace: Option<Namespace>,
}

impl PipelineTrigger {
    pub fn new(namespace: Option<Namespace>) -> Self {
        Self { namespace }
    }

    /// Requests one execution of the pipeline
    ///
    /// Calls are not de-duplicated: each call requests a new run.
    ///
    /// # Errors
    /// `Definition` if the definition is invalid (nothing is sent);
    /// `TriggerRejected` if a force-run was refused and the fallback failed
    /// too; `PartialTrigger` if a force-run was refused after earlier entry
    /// units were already forced.
    pub async fn trigger(
        &self,
        session: &dyn WarehouseSession,
        pipeline: &str,
        definition: &PipelineDefinition,
    ) -> Result<TriggerOutcome> {
        validate(definition)?;
        let ns = self.namespace.as_ref();

        let mut forced = Vec::new();
        for node in definition.entry_nodes() {
            let unit = ObjectName::task(pipeline, &node.name, ns);
            match session.execute(&Statement::ForceRunTask(unit.clone())).await {
                Ok(()) => {
                    info!(unit = %unit, "Triggered task");
                    forced.push(unit);
                }
                Err(rejection) if !forced.is_empty() => {
                    warn!(
                        unit = %unit,
                        error = %rejection,
                        "Force run rejected after other entry tasks were triggered"
                    );
                    let unforced = definition
                        .entry_nodes()
                        .map(|n| ObjectName::task(pipeline, &n.name, ns))
                        .filter(|u| !forced.contains(u))
                        .map(|u| u.to_string())
                        .collect();
                    return Err(PipelineError::PartialTrigger {
                        forced: forced.iter().map(ToString::to_string).collect(),
                        unforced,
                        source: rejection,
                    });
                }
                Err(rejection) => {
                    warn!(
                        unit = %unit,
                        error = %rejection,
                        "Force run rejected, starting pipeline from its root task"
                    );
                    self.run_from_root(session, pipeline, &unit).await?;
                    return Ok(TriggerOutcome::Fallback {
                        rejected_unit: unit,
                        reason: rejection.to_string(),
                    });
                }
            }
        }

        Ok(TriggerOutcome::Forced(forced))
    }

    async fn run_from_root(
        &self,
        session: &dyn WarehouseSession,
        pipeline: &str,
        rejected: &ObjectName,
    ) -> Result<()> {
        let root = ObjectName::root(pipeline, self.namespace.as_ref());
        let steps = [
            Statement::EnableTaskDependents(root.clone()),
            Statement::ResumeTask(root.clone()),
            Statement::ExecuteTask(root.clone()),
        ];

        for statement in &steps {
            session
                .execute(statement)
                .await
                .map_err(|source| PipelineError::TriggerRejected {
                    unit: rejected.to_string(),
                    source,
                })?;
        }

        info!(root = %root, "Executed root task");
        Ok(())
    }
}
