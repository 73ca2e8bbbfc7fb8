//! Subgraph: the retrieved neighborhood a query is answered from.

use std::collections::HashSet;

use serde::Serialize;
use super::{Node, NodeId, Path, Relationship};

/// Deduplicated nodes, relationships and paths retrieved for one query.
///
/// Nodes are keyed by id: the first insertion wins and later duplicates
/// are ignored. Insertion order is preserved for rendering. Relationships
/// may repeat when distinct paths share an edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Subgraph {
    nodes: Vec<Node>,
    #[serde(skip)]
    index: HashSet<NodeId>,
    pub relationships: Vec<Relationship>,
    pub paths: Vec<Path>,
}

impl Subgraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node. Returns `false` if a node with this id is already present.
    pub fn insert_node(&mut self, node: Node) -> bool {
        if !self.index.insert(node.id) {
            return false;
        }
        self.nodes.push(node);
        true
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        if !self.index.contains(&id) {
            return None;
        }
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.index.contains(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty() && self.paths.is_empty()
    }

    /// Display names of all nodes, in insertion order, without duplicates.
    pub fn node_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.nodes
            .iter()
            .map(|n| n.name.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }

    /// Mean node consistency, 0 when there are no nodes.
    pub fn mean_consistency(&self) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }
        let total: f64 = self.nodes.iter().map(|n| n.consistency.unwrap_or(0.0)).sum();
        total / self.nodes.len() as f64
    }
}
