//! Node registry
//!
//! Registers node functions as remote procedures. Registration packages the
//! configured source directories, uploads every staged bundle, then issues a
//! create-or-replace of the procedure, so registering the same name twice
//! leaves one live definition.

use stagehand_client::WarehouseSession;
use stagehand_core::graph::validate;
use stagehand_core::statement::CreateProcedure;
use stagehand_core::{FunctionRef, Namespace, ObjectName, PipelineDefinition, Statement};
use std::path::PathBuf;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::packaging::{Bundler, PackagingConfig, resolve_runtime_package};

/// How node functions are registered remotely
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    pub language: String,
    pub runtime_version: String,
    /// Package every procedure needs; pinned through `environment_file`
    pub runtime_package: String,
    /// Further packages listed verbatim
    pub packages: Vec<String>,
    /// Environment YAML with a `dependencies` list
    pub environment_file: Option<PathBuf>,
    pub packaging: PackagingConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            language: "PYTHON".to_string(),
            runtime_version: "3.11".to_string(),
            runtime_package: "snowflake-snowpark-python".to_string(),
            packages: Vec::new(),
            environment_file: None,
            packaging: PackagingConfig::default(),
        }
    }
}

/// Bundles already uploaded, ready to be referenced by procedures
#[derive(Debug, Clone, PartialEq, Eq)]
struct Prepared {
    packages: Vec<String>,
    imports: Vec<String>,
}

pub struct NodeRegistry {
    config: RegistryConfig,
    bundler: Bundler,
}

impl NodeRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        let bundler = Bundler::new(config.packaging.clone());
        Self { config, bundler }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Registers one function as a remote procedure
    ///
    /// # Arguments
    /// * `session` - Warehouse session to register through
    /// * `function` - The node function; its `handler` is the remote entry point
    /// * `name` - Procedure name, unique within `namespace`
    /// * `namespace` - Database and schema to create the procedure in
    ///
    /// # Returns
    /// The qualified procedure name
    ///
    /// # Errors
    /// `Packaging` if bundles cannot be built, `UploadRejected` if a bundle
    /// upload is refused, `RegistrationRejected` if the procedure is.
    pub async fn register(
        &self,
        session: &dyn WarehouseSession,
        function: &FunctionRef,
        name: &str,
        namespace: Option<&Namespace>,
    ) -> Result<ObjectName> {
        let prepared = self.prepare(session).await?;
        let procedure = ObjectName::qualified(name, namespace);
        self.create_procedure(session, function, procedure, &prepared)
            .await
    }

    /// Registers every distinct function of a definition
    ///
    /// Bundles are built and uploaded once; procedures are then created in
    /// the order functions first appear in the definition and named
    /// `{pipeline}_{function}_sproc`. The definition is validated first, so a
    /// function bound to two handlers is refused before any upload.
    pub async fn register_all(
        &self,
        session: &dyn WarehouseSession,
        pipeline: &str,
        definition: &PipelineDefinition,
        namespace: Option<&Namespace>,
    ) -> Result<Vec<ObjectName>> {
        validate(definition)?;
        let prepared = self.prepare(session).await?;

        let mut registered = Vec::new();
        for function in definition.functions() {
            let procedure = ObjectName::procedure(pipeline, &function.name, namespace);
            registered.push(
                self.create_procedure(session, function, procedure, &prepared)
                    .await?,
            );
        }
        Ok(registered)
    }

    async fn prepare(&self, session: &dyn WarehouseSession) -> Result<Prepared> {
        self.bundler.build()?;
        let staged = self.bundler.staged_files()?;

        let stage = &self.config.packaging.stage;
        for file in &staged {
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            session
                .put_file(file, stage)
                .await
                .map_err(|source| PipelineError::UploadRejected {
                    file: file_name.clone(),
                    source,
                })?;
            info!(bundle = %file_name, stage = %stage, "Uploaded bundle");
        }

        let mut packages = vec![resolve_runtime_package(
            self.config.environment_file.as_deref(),
            &self.config.runtime_package,
        )?];
        packages.extend(self.config.packages.iter().cloned());

        Ok(Prepared {
            packages,
            imports: self.bundler.imports(&staged),
        })
    }

    async fn create_procedure(
        &self,
        session: &dyn WarehouseSession,
        function: &FunctionRef,
        procedure: ObjectName,
        prepared: &Prepared,
    ) -> Result<ObjectName> {
        let statement = Statement::CreateProcedure(CreateProcedure {
            name: procedure.clone(),
            language: self.config.language.clone(),
            runtime_version: self.config.runtime_version.clone(),
            packages: prepared.packages.clone(),
            imports: prepared.imports.clone(),
            handler: function.handler.clone(),
        });

        session
            .execute(&statement)
            .await
            .map_err(|source| PipelineError::RegistrationRejected {
                procedure: procedure.to_string(),
                source,
            })?;

        info!(procedure = %procedure, function = %function.name, "Registered stored procedure");
        Ok(procedure)
    }
}
