//! Host modules for pipeline definitions
//!
//! The host decides what a definition may read: the CLI exposes selected
//! variables through `env` and routes `log` calls into its tracing output.

pub mod env;
pub mod log;

pub use env::{EnvModule, StaticVars, VarProvider};
pub use log::LogModule;
