//! Entity mentions → concrete graph nodes.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::generator::Generator;
use crate::model::Node;
use crate::storage::GraphStore;
use super::Pipeline;

/// Resolves entity mentions to stored nodes by name containment.
///
/// One lookup per mention, capped at `matches_per_entity`. Results follow
/// mention order, then store order. A mention with no match contributes
/// nothing.
pub struct NodeMatcher<'a, S, G> {
    pipeline: &'a Pipeline<S, G>,
}

impl<'a, S: GraphStore, G: Generator> NodeMatcher<'a, S, G> {
    pub(super) fn new(pipeline: &'a Pipeline<S, G>) -> Self {
        Self { pipeline }
    }

    pub async fn match_entities(&self, entities: &[String]) -> Vec<Node> {
        let started = Instant::now();
        let Some(session) = self.pipeline.session("match").await else {
            return Vec::new();
        };
        let limit = self.pipeline.settings().matches_per_entity;

        let mut nodes = Vec::new();
        for entity in entities {
            let entity = entity.trim();
            // An empty fragment would match every node.
            if entity.is_empty() {
                continue;
            }
            match self.pipeline.store().find_nodes(&session, entity, limit).await {
                Ok(found) => {
                    debug!(stage = "match", entity, matches = found.len());
                    nodes.extend(found);
                }
                Err(e) => warn!(stage = "match", entity, error = %e, "node lookup failed"),
            }
        }

        info!(
            stage = "match",
            entities = entities.len(),
            seeds = nodes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "entities matched"
        );
        nodes
    }
}
