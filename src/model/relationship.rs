//! Relationship (edge) record in a retrieved subgraph.

use serde::{Deserialize, Serialize};
use super::{NodeId, PropertyMap, Value};

/// A directed relationship between two retrieved nodes.
///
/// Endpoint names are carried alongside the ids so that allow-lists and
/// aggregation keys never need a node lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub from_id: NodeId,
    pub from_name: String,
    pub to_id: NodeId,
    pub to_name: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub properties: PropertyMap,
    /// Fraction of self-consistency samples that contained this relationship.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consistency: Option<f64>,
}

impl Relationship {
    pub fn new(
        from: (NodeId, impl Into<String>),
        to: (NodeId, impl Into<String>),
        rel_type: impl Into<String>,
    ) -> Self {
        Self {
            from_id: from.0,
            from_name: from.1.into(),
            to_id: to.0,
            to_name: to.1.into(),
            rel_type: rel_type.into(),
            properties: PropertyMap::new(),
            consistency: None,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// `"from → type → to"`, the allow-list rendering.
    pub fn triple(&self) -> String {
        format!("{} → {} → {}", self.from_name, self.rel_type, self.to_name)
    }
}
