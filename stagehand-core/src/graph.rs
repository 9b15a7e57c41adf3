//! Definition validation and ordering
//!
//! Both functions here are pure: they only look at the definition, so they
//! can run before anything is sent to the warehouse.

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

use crate::domain::definition::{FunctionRef, NodeSpec, PipelineDefinition};
use crate::error::DefinitionError;

/// Checks that the definition can be compiled
///
/// Rejects empty definitions, unnamed or duplicate nodes, functions bound to
/// two handlers, dependencies on nodes that do not exist, and dependency
/// cycles (including a node that depends on itself). Unquoted warehouse
/// identifiers are case-insensitive, so names that differ only in case count
/// as duplicates.
pub fn validate(definition: &PipelineDefinition) -> Result<(), DefinitionError> {
    topological_order(definition).map(|_| ())
}

/// Returns the nodes ordered so every node follows all of its dependencies
///
/// The order is a pure function of the definition, so repeated compiles of
/// the same definition emit units in the same sequence.
pub fn topological_order(
    definition: &PipelineDefinition,
) -> Result<Vec<&NodeSpec>, DefinitionError> {
    if definition.is_empty() {
        return Err(DefinitionError::Empty);
    }

    let mut graph: DiGraph<&NodeSpec, ()> = DiGraph::with_capacity(definition.len(), 0);
    let mut index: HashMap<&str, NodeIndex> = HashMap::new();
    let mut folded: HashSet<String> = HashSet::new();

    for (pos, node) in definition.nodes().iter().enumerate() {
        if node.name.trim().is_empty() {
            return Err(DefinitionError::EmptyNodeName(pos));
        }
        if !folded.insert(node.name.to_ascii_lowercase()) {
            return Err(DefinitionError::DuplicateNode(node.name.clone()));
        }
        index.insert(node.name.as_str(), graph.add_node(node));
    }
    check_functions(definition)?;

    for node in definition.nodes() {
        let to = index[node.name.as_str()];
        for dependency in &node.depends_on {
            let from = index.get(dependency.as_str()).ok_or_else(|| {
                DefinitionError::DanglingDependency {
                    node: node.name.clone(),
                    dependency: dependency.clone(),
                }
            })?;
            graph.add_edge(*from, to, ());
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(|idx| graph[idx]).collect()),
        Err(cycle) => Err(DefinitionError::Cycle {
            nodes: cycle_members(&graph, cycle.node_id()),
        }),
    }
}

/// Every function name maps to one procedure, so it must map to one handler
fn check_functions(definition: &PipelineDefinition) -> Result<(), DefinitionError> {
    let mut seen: HashMap<String, &FunctionRef> = HashMap::new();
    for node in definition.nodes() {
        let function = &node.function;
        match seen.get(&function.name.to_ascii_lowercase()) {
            None => {
                seen.insert(function.name.to_ascii_lowercase(), function);
            }
            Some(first) if first.name != function.name => {
                return Err(DefinitionError::DuplicateFunction(function.name.clone()));
            }
            Some(first) if first.handler != function.handler => {
                return Err(DefinitionError::ConflictingHandler {
                    function: function.name.clone(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Names of the nodes on the cycle through `start`, in declaration order
fn cycle_members(graph: &DiGraph<&NodeSpec, ()>, start: NodeIndex) -> Vec<String> {
    let mut members = tarjan_scc(graph)
        .into_iter()
        .find(|component| component.contains(&start))
        .unwrap_or_else(|| vec![start]);
    members.sort();
    members
        .into_iter()
        .map(|idx| graph[idx].name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::definition::FunctionRef;
    use proptest::prelude::*;

    fn node(name: &str, deps: &[&str]) -> NodeSpec {
        deps.iter().fold(
            NodeSpec::new(name, FunctionRef::new("f", "nodes.f")),
            |node, dep| node.depends_on(*dep),
        )
    }

    fn names(order: Vec<&NodeSpec>) -> Vec<&str> {
        order.into_iter().map(|n| n.name.as_str()).collect()
    }

    #[test]
    fn test_chain_keeps_declared_order() {
        let definition = PipelineDefinition::new()
            .with_node(node("split", &[]))
            .with_node(node("train", &["split"]))
            .with_node(node("evaluate", &["train", "split"]));

        let order = topological_order(&definition).unwrap();
        assert_eq!(names(order), vec!["split", "train", "evaluate"]);
    }

    #[test]
    fn test_reversed_declaration_is_reordered() {
        let definition = PipelineDefinition::new()
            .with_node(node("b", &["a"]))
            .with_node(node("a", &[]));

        let order = topological_order(&definition).unwrap();
        assert_eq!(names(order), vec!["a", "b"]);
    }

    #[test]
    fn test_dangling_dependency() {
        let definition = PipelineDefinition::new().with_node(node("a", &["missing"]));

        assert_eq!(
            validate(&definition),
            Err(DefinitionError::DanglingDependency {
                node: "a".to_string(),
                dependency: "missing".to_string(),
            })
        );
    }

    #[test]
    fn test_two_node_cycle() {
        let definition = PipelineDefinition::new()
            .with_node(node("a", &["b"]))
            .with_node(node("b", &["a"]));

        assert_eq!(
            validate(&definition),
            Err(DefinitionError::Cycle {
                nodes: vec!["a".to_string(), "b".to_string()],
            })
        );
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let definition = PipelineDefinition::new()
            .with_node(node("a", &[]))
            .with_node(node("b", &["b"]));

        assert_eq!(
            validate(&definition),
            Err(DefinitionError::Cycle {
                nodes: vec!["b".to_string()],
            })
        );
    }

    #[test]
    fn test_empty_and_duplicate_definitions() {
        assert_eq!(
            validate(&PipelineDefinition::new()),
            Err(DefinitionError::Empty)
        );

        let duplicate = PipelineDefinition::new()
            .with_node(node("a", &[]))
            .with_node(node("a", &[]));
        assert_eq!(
            validate(&duplicate),
            Err(DefinitionError::DuplicateNode("a".to_string()))
        );

        let unnamed = PipelineDefinition::new().with_node(node(" ", &[]));
        assert_eq!(validate(&unnamed), Err(DefinitionError::EmptyNodeName(0)));
    }

    #[test]
    fn test_names_differing_only_in_case_are_duplicates() {
        let definition = PipelineDefinition::new()
            .with_node(node("Train", &[]))
            .with_node(node("train", &["Train"]));

        assert_eq!(
            validate(&definition),
            Err(DefinitionError::DuplicateNode("train".to_string()))
        );
    }

    #[test]
    fn test_function_names_differing_only_in_case() {
        let definition = PipelineDefinition::new()
            .with_node(NodeSpec::new("a", FunctionRef::new("Clean", "nodes.clean")))
            .with_node(NodeSpec::new("b", FunctionRef::new("clean", "nodes.clean")));

        assert_eq!(
            validate(&definition),
            Err(DefinitionError::DuplicateFunction("clean".to_string()))
        );
    }

    #[test]
    fn test_one_function_with_two_handlers() {
        let definition = PipelineDefinition::new()
            .with_node(NodeSpec::new("a", FunctionRef::new("clean", "nodes.clean")))
            .with_node(NodeSpec::new("b", FunctionRef::new("clean", "other.clean")));

        assert_eq!(
            validate(&definition),
            Err(DefinitionError::ConflictingHandler {
                function: "clean".to_string(),
            })
        );

        // Sharing the whole reference is fine
        let shared = PipelineDefinition::new()
            .with_node(NodeSpec::new("a", FunctionRef::new("clean", "nodes.clean")))
            .with_node(NodeSpec::new("b", FunctionRef::new("clean", "nodes.clean")));
        assert_eq!(validate(&shared), Ok(()));
    }

    proptest! {
        // Random DAGs: node i may only depend on nodes with a smaller index,
        // then the declaration order is shuffled.
        #[test]
        fn order_respects_every_edge(
            edges in prop::collection::vec(prop::collection::vec(any::<bool>(), 0..8), 1..8),
            shuffle in any::<u64>(),
        ) {
            let count = edges.len();
            let mut nodes: Vec<NodeSpec> = (0..count)
                .map(|i| {
                    let deps: Vec<String> = (0..i)
                        .filter(|j| edges[i].get(*j).copied().unwrap_or(false))
                        .map(|j| format!("n{j}"))
                        .collect();
                    let refs: Vec<&str> = deps.iter().map(String::as_str).collect();
                    node(&format!("n{i}"), &refs)
                })
                .collect();
            nodes.rotate_left((shuffle as usize) % count);

            let definition = nodes.into_iter().fold(PipelineDefinition::new(), |d, n| d.with_node(n));
            let order = names(topological_order(&definition).unwrap());
            prop_assert_eq!(order.len(), count);

            for spec in definition.nodes() {
                let at = order.iter().position(|n| *n == spec.name).unwrap();
                for dep in &spec.depends_on {
                    let dep_at = order.iter().position(|n| n == dep).unwrap();
                    prop_assert!(dep_at < at);
                }
            }
        }
    }
}
