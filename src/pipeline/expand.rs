//! Seed nodes → bounded neighborhood.

use std::collections::HashSet;
use std::time::Instant;

use tracing::{info, warn};

use crate::generator::Generator;
use crate::model::{Node, NodeId, Subgraph};
use crate::storage::{GraphStore, HopBound, TraversalPath};
use super::Pipeline;

/// Pulls every path of length `1..=depth` from the seeds, shortest first,
/// capped at `top_k`, into a [`Subgraph`].
pub struct SubgraphExpander<'a, S, G> {
    pipeline: &'a Pipeline<S, G>,
}

impl<'a, S: GraphStore, G: Generator> SubgraphExpander<'a, S, G> {
    pub(super) fn new(pipeline: &'a Pipeline<S, G>) -> Self {
        Self { pipeline }
    }

    /// No seeds yields an empty subgraph without touching the store.
    pub async fn expand(&self, seeds: &[Node], depth: HopBound, top_k: usize) -> Subgraph {
        if seeds.is_empty() {
            return Subgraph::new();
        }
        let started = Instant::now();

        let mut seen = HashSet::new();
        let ids: Vec<NodeId> = seeds.iter().map(|n| n.id).filter(|id| seen.insert(*id)).collect();

        let traversals = match self.pipeline.session("expand").await {
            Some(session) => match self.pipeline.store().paths_from(&session, &ids, depth, top_k).await {
                Ok(paths) => paths,
                Err(e) => {
                    warn!(stage = "expand", error = %e, "traversal failed");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let subgraph = assemble(traversals);
        info!(
            stage = "expand",
            seeds = ids.len(),
            depth = depth.get(),
            nodes = subgraph.node_count(),
            relationships = subgraph.relationships.len(),
            paths = subgraph.paths.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "subgraph expanded"
        );
        subgraph
    }
}

/// Fold traversal results into a subgraph: nodes deduplicated by id (first
/// wins), one relationship per hop, one described path per traversal.
pub(crate) fn assemble(traversals: Vec<TraversalPath>) -> Subgraph {
    let mut subgraph = Subgraph::new();
    for traversal in traversals {
        let Some(path) = traversal.into_path() else {
            warn!(stage = "expand", "discarding traversal with mismatched node and hop counts");
            continue;
        };
        for node in &path.nodes {
            subgraph.insert_node(node.clone());
        }
        subgraph.relationships.extend(path.relationships.iter().cloned());
        subgraph.paths.push(path);
    }
    subgraph
}
