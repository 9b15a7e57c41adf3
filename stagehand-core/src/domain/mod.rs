//! Core domain types
//!
//! This module contains the structures shared by the compiler, the trigger
//! and the direct executor. A [`definition::PipelineDefinition`] is the
//! design-time description of a pipeline; [`unit`] holds the remote artifacts
//! it compiles into.

pub mod definition;
pub mod unit;
