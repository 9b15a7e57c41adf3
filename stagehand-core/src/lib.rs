//! Stagehand Core
//!
//! Core types and abstractions for the Stagehand pipeline compiler.
//!
//! This crate contains:
//! - Domain types: pipeline definitions, node specs, scheduled units
//! - Graph validation and topological ordering
//! - The remote statement AST and its text rendering
//! - Literal argument encoding for unit invocations
//! - The data-asset catalogue consumed by node functions

pub mod catalogue;
pub mod domain;
pub mod error;
pub mod graph;
pub mod literal;
pub mod statement;

pub use domain::definition::{FunctionRef, NodeSpec, Parameters, PipelineDefinition, Value};
pub use domain::unit::{Namespace, ObjectName, RootUnit, ScheduledUnit};
pub use catalogue::{AssetLocation, AssetSpec, DataCatalogue};
pub use error::{CatalogueError, DefinitionError, LiteralError};
pub use statement::Statement;
