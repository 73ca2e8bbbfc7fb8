//! Node in the property graph.

use serde::{Deserialize, Serialize};
use super::{PropertyMap, Value};

/// Opaque node identifier, assigned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node as retrieved from the store.
///
/// Identity is `id`; `name` is a display string and is not unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Primary label (the node's type).
    #[serde(rename = "type")]
    pub label: String,
    pub name: String,
    pub properties: PropertyMap,
    /// Fraction of self-consistency samples that contained this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consistency: Option<f64>,
}

impl Node {
    pub fn new(id: NodeId, label: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            name: name.into(),
            properties: PropertyMap::new(),
            consistency: None,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Properties worth showing next to the name: everything except the
    /// identifier/name keys and blank values.
    pub fn descriptive_properties(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.properties
            .iter()
            .filter(|(k, v)| k.as_str() != "id" && k.as_str() != "name" && !v.is_blank())
    }
}
