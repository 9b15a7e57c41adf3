//! Stagehand Lua definitions
//!
//! Pipelines are declared in Lua files evaluated inside a restricted
//! sandbox. This crate provides:
//! - The sandbox and its always-present `pipeline` module
//! - The module trait and registry for host-provided modules (`env`, `log`)
//! - The parser turning an evaluated definition into a `PipelineDefinition`

pub mod module;
pub mod modules;
pub mod parser;
pub mod sandbox;

pub use module::{DefinitionModule, ModuleRegistry};
pub use modules::{EnvModule, LogModule, StaticVars, VarProvider};
pub use parser::{ParsedPipeline, parse_pipeline, parse_pipeline_file};
pub use sandbox::create_sandbox;
