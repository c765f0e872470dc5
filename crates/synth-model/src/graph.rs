use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SynthError};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

/// Directed dependency graph over dataset variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub nodes: Vec<String>,
    pub edges: Vec<Edge>,
}

impl DependencyGraph {
    pub fn new<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            nodes: nodes.into_iter().map(Into::into).collect(),
            edges: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.add_edge(from, to);
        self
    }

    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        let edge = Edge {
            from: from.into(),
            to: to.into(),
        };
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    /// Parents of `node` in edge insertion order.
    pub fn parents(&self, node: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|edge| edge.to == node)
            .map(|edge| edge.from.as_str())
            .collect()
    }

    /// Kahn ordering; ties resolve in node declaration order.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let position: BTreeMap<&str, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.as_str(), index))
            .collect();
        let mut indegree = vec![0usize; self.nodes.len()];
        for edge in &self.edges {
            let (Some(_), Some(&to)) = (
                position.get(edge.from.as_str()),
                position.get(edge.to.as_str()),
            ) else {
                return Err(SynthError::invalid_config(format!(
                    "graph edge {} -> {} references an unknown node",
                    edge.from, edge.to
                )));
            };
            indegree[to] += 1;
        }
        let mut ready: VecDeque<usize> = (0..self.nodes.len())
            .filter(|&index| indegree[index] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(index) = ready.pop_front() {
            let node = &self.nodes[index];
            order.push(node.clone());
            let mut released = BTreeSet::new();
            for edge in self.edges.iter().filter(|edge| &edge.from == node) {
                let to = position[edge.to.as_str()];
                indegree[to] -= 1;
                if indegree[to] == 0 {
                    released.insert(to);
                }
            }
            ready.extend(released);
        }
        if order.len() != self.nodes.len() {
            return Err(SynthError::invalid_config(
                "dependency graph contains a cycle",
            ));
        }
        Ok(order)
    }

    /// True when adding `from -> to` keeps the graph acyclic.
    pub fn accepts_edge(&self, from: &str, to: &str) -> bool {
        if from == to {
            return false;
        }
        // A path to -> ... -> from would close a cycle.
        let mut stack = vec![to];
        let mut visited = BTreeSet::new();
        while let Some(node) = stack.pop() {
            if node == from {
                return false;
            }
            if visited.insert(node) {
                stack.extend(
                    self.edges
                        .iter()
                        .filter(|edge| edge.from == node)
                        .map(|edge| edge.to.as_str()),
                );
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topological_order_follows_edges() {
        let graph = DependencyGraph::new(["C", "B", "A"])
            .with_edge("A", "B")
            .with_edge("B", "C");
        assert_eq!(graph.topological_order().unwrap(), vec!["A", "B", "C"]);
    }

    #[test]
    fn cycle_is_rejected() {
        let graph = DependencyGraph::new(["A", "B"])
            .with_edge("A", "B")
            .with_edge("B", "A");
        assert!(matches!(
            graph.topological_order(),
            Err(SynthError::InvalidConfiguration(_))
        ));
        assert!(!DependencyGraph::new(["A", "B"])
            .with_edge("A", "B")
            .accepts_edge("B", "A"));
    }

    #[test]
    fn unknown_node_is_rejected() {
        let graph = DependencyGraph::new(["A"]).with_edge("A", "Z");
        assert!(graph.topological_order().is_err());
    }
}
