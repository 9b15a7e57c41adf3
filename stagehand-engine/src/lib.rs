//! Stagehand engine
//!
//! Turns a validated `PipelineDefinition` into remote work, or runs it in
//! process:
//! - [`NodeRegistry`]: packages code bundles and registers node functions as
//!   remote procedures
//! - [`PipelineCompiler`]: emits the root task and one task per node, in
//!   topological order
//! - [`PipelineTrigger`]: force-runs entry tasks, falling back to the root
//! - [`DirectExecutor`]: runs node functions sequentially for local work
//! - [`PipelineDeployer`]: validate, register, compile, trigger
//!
//! Every remote operation takes the session explicitly and issues one call
//! at a time.

pub mod compiler;
pub mod deploy;
pub mod error;
pub mod executor;
pub mod packaging;
pub mod registry;
pub mod trigger;

pub use compiler::{CompiledPipeline, PipelineCompiler};
pub use deploy::{DeployReport, PipelineDeployer};
pub use error::{PipelineError, Result};
pub use executor::{DirectExecutor, NodeFunction, NodeRun, NodeTable};
pub use packaging::{Bundle, Bundler, PackagingConfig, PackagingError};
pub use registry::{NodeRegistry, RegistryConfig};
pub use trigger::{PipelineTrigger, TriggerOutcome};
