// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 flowspec contributors

//! Step dependency graph
//!
//! Builds the directed graph of a pipeline's steps, with an edge from each
//! dependency to the step that depends on it, and detects cycles with Kahn's
//! algorithm. The graph is rebuilt from scratch on every check.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, VecDeque};

use crate::errors::{FlowspecError, FlowspecResult};
use crate::pipeline::Step;

/// Dependency graph over step names
#[derive(Debug, Clone, Default)]
pub struct StepGraph {
    graph: DiGraph<String, ()>,
    name_to_index: HashMap<String, NodeIndex>,
}

impl StepGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph of a step list
    pub fn build(steps: &[Step]) -> FlowspecResult<Self> {
        Self::from_dependencies(
            steps
                .iter()
                .map(|step| (step.name(), step.dependency_names())),
        )
    }

    /// Build from `(step, dependencies)` pairs; every dependency must be listed
    pub fn from_dependencies<'a, I>(entries: I) -> FlowspecResult<Self>
    where
        I: IntoIterator<Item = (&'a str, Vec<&'a str>)>,
    {
        let entries: Vec<(&str, Vec<&str>)> = entries.into_iter().collect();
        let mut builder = Self::new();

        for (name, _) in &entries {
            if builder.name_to_index.contains_key(*name) {
                return Err(FlowspecError::NameConflict {
                    scope: "pipeline".into(),
                    name: name.to_string(),
                });
            }
            let node = builder.graph.add_node(name.to_string());
            builder.name_to_index.insert(name.to_string(), node);
        }

        for (name, deps) in &entries {
            let step_node = builder.name_to_index[*name];
            for dep in deps {
                let dep_node = builder
                    .name_to_index
                    .get(*dep)
                    .copied()
                    .ok_or_else(|| FlowspecError::UnknownStep {
                        step: dep.to_string(),
                    })?;
                if !builder.graph.contains_edge(dep_node, step_node) {
                    builder.graph.add_edge(dep_node, step_node, ());
                }
            }
        }

        Ok(builder)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Run Kahn's algorithm; returns the visit order and the untraveled steps
    fn kahn(&self) -> (Vec<NodeIndex>, Vec<NodeIndex>) {
        let mut pending: Vec<usize> = self
            .graph
            .node_indices()
            .map(|n| self.graph.neighbors_directed(n, Direction::Incoming).count())
            .collect();

        let mut worklist: VecDeque<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|n| pending[n.index()] == 0)
            .collect();

        // Steps present but no entry: nothing can be ordered
        if worklist.is_empty() {
            return (Vec::new(), self.graph.node_indices().collect());
        }

        let mut order = Vec::with_capacity(self.len());
        while let Some(node) = worklist.pop_front() {
            order.push(node);
            for dependent in self.sorted_neighbors(node, Direction::Outgoing) {
                pending[dependent.index()] -= 1;
                if pending[dependent.index()] == 0 {
                    worklist.push_back(dependent);
                }
            }
        }

        let untraveled = self
            .graph
            .node_indices()
            .filter(|n| pending[n.index()] > 0)
            .collect();
        (order, untraveled)
    }

    /// Names of steps caught in or behind a cycle, if any
    pub fn detect_cycle(&self) -> Option<Vec<String>> {
        let (_, untraveled) = self.kahn();
        if untraveled.is_empty() {
            None
        } else {
            Some(untraveled.into_iter().map(|n| self.graph[n].clone()).collect())
        }
    }

    /// Whether the graph contains a directed cycle
    pub fn has_cycle(&self) -> bool {
        self.detect_cycle().is_some()
    }

    /// Fail with `CycleDetected` listing the untraveled steps
    pub fn ensure_acyclic(&self) -> FlowspecResult<()> {
        match self.detect_cycle() {
            Some(steps) => Err(FlowspecError::CycleDetected { steps }),
            None => Ok(()),
        }
    }

    /// Step names in a dependency-respecting order
    pub fn topological_order(&self) -> FlowspecResult<Vec<String>> {
        let (order, untraveled) = self.kahn();
        if !untraveled.is_empty() {
            return Err(FlowspecError::CycleDetected {
                steps: untraveled.into_iter().map(|n| self.graph[n].clone()).collect(),
            });
        }
        Ok(order.into_iter().map(|n| self.graph[n].clone()).collect())
    }

    fn sorted_neighbors(&self, node: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let mut neighbors: Vec<NodeIndex> = self.graph.neighbors_directed(node, direction).collect();
        neighbors.sort();
        neighbors
    }

    /// Steps that must run before `step_name`
    pub fn dependencies(&self, step_name: &str) -> Option<Vec<String>> {
        let node = self.name_to_index.get(step_name)?;
        Some(
            self.sorted_neighbors(*node, Direction::Incoming)
                .into_iter()
                .map(|n| self.graph[n].clone())
                .collect(),
        )
    }

    /// Steps that depend on `step_name`
    pub fn dependents(&self, step_name: &str) -> Option<Vec<String>> {
        let node = self.name_to_index.get(step_name)?;
        Some(
            self.sorted_neighbors(*node, Direction::Outgoing)
                .into_iter()
                .map(|n| self.graph[n].clone())
                .collect(),
        )
    }

    /// Check if step A depends (directly or transitively) on step B
    pub fn depends_on(&self, step_a: &str, step_b: &str) -> bool {
        let Some(node_a) = self.name_to_index.get(step_a) else {
            return false;
        };
        let Some(node_b) = self.name_to_index.get(step_b) else {
            return false;
        };

        petgraph::algo::has_path_connecting(&self.graph, *node_b, *node_a, None)
    }

    fn edges(&self) -> Vec<(&str, &str)> {
        let mut edges: Vec<(NodeIndex, NodeIndex)> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .collect();
        edges.sort();
        edges
            .into_iter()
            .map(|(from, to)| (self.graph[from].as_str(), self.graph[to].as_str()))
            .collect()
    }

    /// Generate Mermaid diagram of the DAG
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");

        for node in self.graph.node_indices() {
            let name = &self.graph[node];
            out.push_str(&format!("    {}[{}]\n", name, name));
        }

        for (from, to) in self.edges() {
            out.push_str(&format!("    {} --> {}\n", from, to));
        }

        out
    }

    /// Generate DOT diagram of the DAG
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph pipeline {\n");
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for (from, to) in self.edges() {
            out.push_str(&format!("    \"{}\" -> \"{}\";\n", from, to));
        }

        for node in self.graph.node_indices() {
            if self.graph.neighbors_undirected(node).count() == 0 {
                out.push_str(&format!("    \"{}\";\n", self.graph[node]));
            }
        }

        out.push_str("}\n");
        out
    }

    /// Numbered run order with each step's label and dependencies
    pub fn to_text<F>(&self, label: F) -> FlowspecResult<String>
    where
        F: Fn(&str) -> String,
    {
        let order = self.topological_order()?;
        let mut out = String::new();

        for (i, name) in order.iter().enumerate() {
            let deps = self.dependencies(name).unwrap_or_default();

            out.push_str(&format!("{}. {} ({})", i + 1, name, label(name)));

            if !deps.is_empty() {
                out.push_str(&format!(" [depends: {}]", deps.join(", ")));
            }

            out.push('\n');
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(entries: Vec<(&'static str, Vec<&'static str>)>) -> StepGraph {
        StepGraph::from_dependencies(entries).unwrap()
    }

    #[test]
    fn test_empty_graph_is_acyclic() {
        assert!(!graph(vec![]).has_cycle());
    }

    #[test]
    fn test_linear_dag() {
        let dag = graph(vec![("a", vec![]), ("b", vec!["a"]), ("c", vec!["b"])]);
        assert!(!dag.has_cycle());
        assert_eq!(dag.topological_order().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_diamond_dag() {
        let dag = graph(vec![
            ("a", vec![]),
            ("b", vec!["a"]),
            ("c", vec!["a"]),
            ("d", vec!["b", "c"]),
        ]);

        let order = dag.topological_order().unwrap();
        assert_eq!(order, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_single_cycle_detected() {
        let dag = graph(vec![("a", vec!["c"]), ("b", vec!["a"]), ("c", vec!["b"])]);
        let mut cyclic = dag.detect_cycle().unwrap();
        cyclic.sort();
        assert_eq!(cyclic, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_cycle_behind_entry_node() {
        let dag = graph(vec![
            ("root", vec![]),
            ("x", vec!["root", "y"]),
            ("y", vec!["x"]),
            ("tail", vec!["y"]),
        ]);
        let cyclic = dag.detect_cycle().unwrap();
        assert_eq!(cyclic, vec!["x", "y", "tail"]);
        assert!(matches!(
            dag.topological_order(),
            Err(FlowspecError::CycleDetected { .. })
        ));
    }

    #[test]
    fn test_multiple_cycles_and_disjoint_components() {
        let dag = graph(vec![
            ("free", vec![]),
            ("a", vec!["b"]),
            ("b", vec!["a"]),
            ("c", vec!["d"]),
            ("d", vec!["c"]),
        ]);
        assert_eq!(dag.detect_cycle().unwrap().len(), 4);

        let disjoint = graph(vec![("a", vec![]), ("b", vec!["a"]), ("x", vec![]), ("y", vec!["x"])]);
        assert!(!disjoint.has_cycle());
    }

    #[test]
    fn test_unknown_dependency() {
        let result = StepGraph::from_dependencies(vec![("a", vec!["nonexistent"])]);
        assert!(matches!(result, Err(FlowspecError::UnknownStep { .. })));
    }

    #[test]
    fn test_depends_on_check() {
        let dag = graph(vec![("a", vec![]), ("b", vec!["a"]), ("c", vec!["b"])]);

        assert!(dag.depends_on("c", "a"));
        assert!(dag.depends_on("c", "b"));
        assert!(!dag.depends_on("a", "c"));
        assert_eq!(dag.dependents("a").unwrap(), vec!["b"]);
        assert_eq!(dag.dependencies("c").unwrap(), vec!["b"]);
    }

    #[test]
    fn test_renderings() {
        let dag = graph(vec![("a", vec![]), ("b", vec!["a"]), ("lonely", vec![])]);

        let mermaid = dag.to_mermaid();
        assert!(mermaid.starts_with("graph TD\n    a[a]\n"));
        assert!(mermaid.contains("a --> b"));

        let dot = dag.to_dot();
        assert!(dot.contains("\"a\" -> \"b\";"));
        assert!(dot.contains("\"lonely\";"));

        let text = dag.to_text(|_| "op".to_string()).unwrap();
        assert_eq!(text, "1. a (op)\n2. lonely (op)\n3. b (op) [depends: a]\n");
    }
}
