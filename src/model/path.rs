//! Path: a sequence of alternating nodes and relationships.

use serde::{Deserialize, Serialize};
use super::{Node, Relationship};

/// A path in the graph: node -[rel]-> node -[rel]-> node ...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    /// Nodes along the path. Always has one more element than `relationships`.
    pub nodes: Vec<Node>,
    /// Relationships connecting consecutive nodes, in traversal order.
    pub relationships: Vec<Relationship>,
    /// Number of hops.
    pub length: usize,
    /// Human-readable chain, `A[rel]->B[rel]->C`.
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consistency: Option<f64>,
    /// Reasoning score, set by the path reasoner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Path {
    /// Build a path, deriving `length` and `description`.
    ///
    /// Returns `None` unless `nodes.len() == relationships.len() + 1`.
    pub fn new(nodes: Vec<Node>, relationships: Vec<Relationship>) -> Option<Self> {
        if nodes.len() != relationships.len() + 1 {
            return None;
        }
        let description = describe(&nodes, &relationships);
        Some(Self {
            length: relationships.len(),
            nodes,
            relationships,
            description,
            consistency: None,
            score: None,
        })
    }

    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }
}

/// Interleave node names and relationship types in traversal order.
fn describe(nodes: &[Node], relationships: &[Relationship]) -> String {
    let mut out = String::new();
    for (node, rel) in nodes.iter().zip(relationships) {
        out.push_str(&node.name);
        out.push('[');
        out.push_str(&rel.rel_type);
        out.push_str("]->");
    }
    if let Some(last) = nodes.last() {
        out.push_str(&last.name);
    }
    out
}
