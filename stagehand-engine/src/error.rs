//! Engine error taxonomy
//!
//! Definition problems are caught before any remote call. Remote refusals
//! carry the name of the object that was refused and are never retried; the
//! only second attempt is the trigger fallback.

use stagehand_client::SessionError;
use stagehand_core::DefinitionError;
use thiserror::Error;

use crate::packaging::PackagingError;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid pipeline definition: {0}")]
    Definition(#[from] DefinitionError),

    #[error("failed to package code bundles")]
    Packaging(#[from] PackagingError),

    #[error("upload of bundle '{file}' was rejected")]
    UploadRejected {
        file: String,
        #[source]
        source: SessionError,
    },

    #[error("registration of procedure {procedure} was rejected")]
    RegistrationRejected {
        procedure: String,
        #[source]
        source: SessionError,
    },

    #[error("creation of unit {unit} was rejected")]
    CompilationRejected {
        unit: String,
        #[source]
        source: SessionError,
    },

    #[error("force run of unit {unit} was rejected and the root fallback failed")]
    TriggerRejected {
        unit: String,
        #[source]
        source: SessionError,
    },

    #[error(
        "force run refused after {} were triggered; not triggered: {}",
        .forced.join(", "),
        .unforced.join(", ")
    )]
    PartialTrigger {
        forced: Vec<String>,
        unforced: Vec<String>,
        #[source]
        source: SessionError,
    },

    #[error("node '{node}' failed")]
    NodeFailed {
        node: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("node '{node}' uses function '{function}' which has no local implementation")]
    UnknownFunction { node: String, function: String },
}

impl PipelineError {
    /// Whether the error was raised before any remote call
    pub fn is_definition_error(&self) -> bool {
        matches!(self, Self::Definition(_))
    }
}
