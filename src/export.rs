//! Graph export for visualization.
//!
//! Produces the `{nodes, links}` document a force-directed front end
//! consumes: every node tagged with a color group, every relationship
//! with a drawing weight.
//!
//! ```text
//! GraphStore → export_graph() → {nodes: [{id, label, group, type, properties}],
//!                                links: [{source, target, value, relationship_type, properties}]}
//! ```

use serde::{Deserialize, Serialize};
use crate::model::*;
use crate::storage::GraphStore;
use crate::Result;

/// Maximum nodes returned by [`search_nodes`].
pub const SEARCH_LIMIT: usize = 20;

/// Group and weight tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Node type → group. Unlisted types map to `"other"`.
    pub groups: Vec<(String, String)>,
    /// First rule whose substring occurs in the relationship type wins.
    /// Unmatched types weigh 1.
    pub weights: Vec<(String, u32)>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        let pairs = |items: &[(&str, &str)]| {
            items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
        };
        Self {
            groups: pairs(&[
                ("疾病", "disease"),
                ("治疗", "treatment"),
                ("检查", "examination"),
                ("药物", "medication"),
                ("生命体征", "vital_signs"),
                ("并发症", "complication"),
            ]),
            weights: [("治疗", 3), ("药物", 2), ("检查", 1), ("监测", 1), ("并发症", 2)]
                .iter()
                .map(|(k, w)| (k.to_string(), *w))
                .collect(),
        }
    }
}

impl ExportOptions {
    pub fn group_of(&self, node_type: &str) -> &str {
        self.groups
            .iter()
            .find(|(t, _)| t == node_type)
            .map(|(_, g)| g.as_str())
            .unwrap_or("other")
    }

    pub fn weight_of(&self, rel_type: &str) -> u32 {
        self.weights
            .iter()
            .find(|(fragment, _)| rel_type.contains(fragment.as_str()))
            .map(|(_, w)| *w)
            .unwrap_or(1)
    }

    fn node(&self, node: Node) -> ExportNode {
        let label = if node.name.is_empty() { node.id.to_string() } else { node.name.clone() };
        ExportNode {
            id: node.id,
            label,
            group: self.group_of(&node.label).to_string(),
            properties: node.descriptive_properties().map(|(k, v)| (k.clone(), v.clone())).collect(),
            node_type: node.label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportNode {
    pub id: NodeId,
    /// Display name.
    pub label: String,
    pub group: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub properties: PropertyMap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportLink {
    pub source: NodeId,
    pub target: NodeId,
    pub value: u32,
    pub relationship_type: String,
    pub properties: PropertyMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphExport {
    pub nodes: Vec<ExportNode>,
    pub links: Vec<ExportLink>,
}

/// Export every node and relationship in the store.
pub async fn export_graph<S: GraphStore>(store: &S, options: &ExportOptions) -> Result<GraphExport> {
    let session = store.begin_session().await?;
    let nodes = store.all_nodes(&session).await?;
    let relationships = store.all_relationships(&session).await?;

    Ok(GraphExport {
        nodes: nodes.into_iter().map(|n| options.node(n)).collect(),
        links: relationships
            .into_iter()
            .map(|r| ExportLink {
                source: r.from_id,
                target: r.to_id,
                value: options.weight_of(&r.rel_type),
                relationship_type: r.rel_type,
                properties: r.properties,
            })
            .collect(),
    })
}

/// Nodes whose name or notes contain `query` (case-insensitive), shaped
/// like exported nodes.
pub async fn search_nodes<S: GraphStore>(
    store: &S,
    query: &str,
    options: &ExportOptions,
) -> Result<Vec<ExportNode>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let session = store.begin_session().await?;
    let nodes = store.search_nodes(&session, query, SEARCH_LIMIT).await?;
    Ok(nodes.into_iter().map(|n| options.node(n)).collect())
}
