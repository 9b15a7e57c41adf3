//! Pipeline definition domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Parameter key carrying the node's input asset names
pub const INPUT_DATA: &str = "input_data";
/// Parameter key carrying the node's output asset names
pub const OUTPUT_DATA: &str = "output_data";
/// Parameter key carrying the local-execution flag
pub const IS_LOCAL: &str = "is_local";

/// A node parameter value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    String(String),
    Sequence(Vec<String>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[String]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Builds a sequence value from anything yielding string-like items
    pub fn sequence<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::Sequence(items.into_iter().map(Into::into).collect())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Value::Sequence(value)
    }
}

/// Ordered parameter mapping
///
/// Keys are unique; inserting an existing key replaces its value in place,
/// so declaration order is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameters(Vec<(String, Value)>);

impl Parameters {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Asset names under `input_data`, empty when absent
    pub fn input_data(&self) -> &[String] {
        self.get(INPUT_DATA)
            .and_then(Value::as_sequence)
            .unwrap_or_default()
    }

    /// Asset names under `output_data`, empty when absent
    pub fn output_data(&self) -> &[String] {
        self.get(OUTPUT_DATA)
            .and_then(Value::as_sequence)
            .unwrap_or_default()
    }

    pub fn is_local(&self) -> Option<bool> {
        self.get(IS_LOCAL).and_then(Value::as_bool)
    }
}

/// Reference to the processing function behind a node
///
/// `name` is the short function name used to derive the remote callable
/// name and to look up the local implementation. `handler` is the entry
/// point the remote environment invokes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRef {
    pub name: String,
    pub handler: String,
}

impl FunctionRef {
    pub fn new(name: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handler: handler.into(),
        }
    }
}

impl fmt::Display for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.handler)
    }
}

/// One pipeline step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    pub function: FunctionRef,
    pub depends_on: Vec<String>,
    pub parameters: Parameters,
}

impl NodeSpec {
    pub fn new(name: impl Into<String>, function: FunctionRef) -> Self {
        Self {
            name: name.into(),
            function,
            depends_on: Vec::new(),
            parameters: Parameters::new(),
        }
    }

    /// Adds a dependency; repeated names are ignored
    pub fn depends_on(mut self, node: impl Into<String>) -> Self {
        let node = node.into();
        if !self.depends_on.contains(&node) {
            self.depends_on.push(node);
        }
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key, value);
        self
    }

    /// Entry nodes have no declared dependencies
    pub fn is_entry(&self) -> bool {
        self.depends_on.is_empty()
    }
}

/// Ordered collection of nodes making up one pipeline
///
/// Declaration order is kept as given. It is authoritative for the direct
/// executor; the compiler derives its own topological order instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    nodes: Vec<NodeSpec>,
}

impl PipelineDefinition {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn with_node(mut self, node: NodeSpec) -> Self {
        self.push(node);
        self
    }

    pub fn push(&mut self, node: NodeSpec) {
        self.nodes.push(node);
    }

    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [NodeSpec] {
        &mut self.nodes
    }

    pub fn get(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes with no declared dependencies, in declaration order
    pub fn entry_nodes(&self) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.iter().filter(|n| n.is_entry())
    }

    /// Distinct functions referenced by the pipeline, in first-use order
    ///
    /// Keyed on the function name; validation guarantees one handler per name.
    pub fn functions(&self) -> Vec<&FunctionRef> {
        let mut seen: Vec<&FunctionRef> = Vec::new();
        for node in &self.nodes {
            if !seen.iter().any(|f| f.name == node.function.name) {
                seen.push(&node.function);
            }
        }
        seen
    }

    /// Sets `is_local` on every node, overriding declared values
    pub fn set_local(&mut self, is_local: bool) {
        for node in &mut self.nodes {
            node.parameters.insert(IS_LOCAL, is_local);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn func(name: &str) -> FunctionRef {
        FunctionRef::new(name, format!("nodes.{name}.{name}"))
    }

    #[test]
    fn test_parameters_keep_declaration_order() {
        let params = Parameters::new()
            .with("b", "x")
            .with("a", true)
            .with("b", "y");

        let keys: Vec<&str> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(params.get("b"), Some(&Value::from("y")));
    }

    #[test]
    fn test_parameter_accessors_default_when_missing() {
        let params = Parameters::new().with(INPUT_DATA, Value::sequence(["housing"]));
        assert_eq!(params.input_data(), ["housing".to_string()]);
        assert!(params.output_data().is_empty());
        assert_eq!(params.is_local(), None);
    }

    #[test]
    fn test_duplicate_dependency_ignored() {
        let node = NodeSpec::new("b", func("f")).depends_on("a").depends_on("a");
        assert_eq!(node.depends_on, vec!["a"]);
    }

    #[test]
    fn test_entry_nodes_and_functions() {
        let definition = PipelineDefinition::new()
            .with_node(NodeSpec::new("a", func("load")))
            .with_node(NodeSpec::new("b", func("load")).depends_on("a"))
            .with_node(NodeSpec::new("c", func("train")));

        let entries: Vec<&str> = definition.entry_nodes().map(|n| n.name.as_str()).collect();
        assert_eq!(entries, vec!["a", "c"]);

        let functions: Vec<&str> = definition.functions().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(functions, vec!["load", "train"]);
    }

    #[test]
    fn test_set_local_overrides_every_node() {
        let mut definition = PipelineDefinition::new()
            .with_node(NodeSpec::new("a", func("load")).param(IS_LOCAL, false))
            .with_node(NodeSpec::new("b", func("load")));

        definition.set_local(true);
        assert!(definition.nodes().iter().all(|n| n.parameters.is_local() == Some(true)));
    }
}
