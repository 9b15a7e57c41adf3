//! Error types for the Stagehand core

use std::path::PathBuf;
use thiserror::Error;

/// A pipeline definition that cannot be compiled
///
/// Raised before any remote call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("pipeline definition has no nodes")]
    Empty,

    #[error("pipeline name cannot be empty")]
    EmptyPipelineName,

    #[error("node at position {0} has an empty name")]
    EmptyNodeName(usize),

    /// Node names are compared ignoring ASCII case, as unit names are
    #[error("node '{0}' is declared more than once")]
    DuplicateNode(String),

    #[error("function '{0}' differs from another function only in case")]
    DuplicateFunction(String),

    #[error("function '{function}' is bound to more than one handler")]
    ConflictingHandler { function: String },

    #[error("node '{node}' depends on unknown node '{dependency}'")]
    DanglingDependency { node: String, dependency: String },

    #[error("dependency cycle between nodes: {}", .nodes.join(" -> "))]
    Cycle { nodes: Vec<String> },
}

/// Malformed literal argument list
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiteralError {
    #[error("unexpected character '{found}' at offset {pos}")]
    Unexpected { found: char, pos: usize },

    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("unknown keyword '{word}' at offset {pos}")]
    UnknownKeyword { word: String, pos: usize },
}

/// Failure loading or querying the data-asset catalogue
#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("failed to read catalogue {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid catalogue: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("data asset '{0}' is not in the catalogue")]
    UnknownAsset(String),
}
