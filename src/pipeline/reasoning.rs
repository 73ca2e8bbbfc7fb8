//! Multi-hop path reasoning between entity pairs.
//!
//! `score = 0.6 · 1/(hops + 1) + 0.4 · (significant relations / relations)`
//!
//! Paths arrive shortest first and the sort is stable, so ties keep the
//! shorter path in front.

use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::generator::Generator;
use crate::model::Path;
use crate::storage::{GraphStore, HopBound};
use super::Pipeline;

const LENGTH_WEIGHT: f64 = 0.6;
const RELATION_WEIGHT: f64 = 0.4;

/// Best path between two adjacent query entities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReasoningChain {
    pub from: String,
    pub to: String,
    pub path: Path,
}

/// Result of [`Pipeline::multi_hop_reasoning`](super::Pipeline::multi_hop_reasoning).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReasoningOutcome {
    pub start: String,
    pub end: String,
    /// Scored, best first.
    pub paths: Vec<Path>,
}

pub struct PathReasoner<'a, S, G> {
    pipeline: &'a Pipeline<S, G>,
}

impl<'a, S: GraphStore, G: Generator> PathReasoner<'a, S, G> {
    pub(super) fn new(pipeline: &'a Pipeline<S, G>) -> Self {
        Self { pipeline }
    }

    /// Paths from a node named like `start` to a node named like `end`,
    /// scored and sorted best first.
    pub async fn reason(&self, start: &str, end: &str, max_hops: HopBound) -> Vec<Path> {
        let started = Instant::now();
        let settings = self.pipeline.settings();

        let traversals = match self.pipeline.session("reasoning").await {
            Some(session) => match self
                .pipeline
                .store()
                .paths_between(&session, start, end, max_hops, settings.reasoning_path_limit)
                .await
            {
                Ok(paths) => paths,
                Err(e) => {
                    warn!(stage = "reasoning", start, end, error = %e, "path search failed");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let mut paths: Vec<Path> = traversals
            .into_iter()
            .filter_map(|t| t.into_path())
            .filter(|p| !p.is_empty())
            .map(|mut p| {
                p.score = Some(score_path(&p, &settings.significant_relations));
                p
            })
            .collect();
        paths.sort_by(|a, b| b.score.unwrap_or(0.0).total_cmp(&a.score.unwrap_or(0.0)));

        info!(
            stage = "reasoning",
            start,
            end,
            paths = paths.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "reasoning paths scored"
        );
        paths
    }

    /// One chain per adjacent entity pair that has any path; needs at least
    /// two entities.
    pub async fn chains(&self, entities: &[String], max_hops: HopBound) -> Vec<ReasoningChain> {
        if entities.len() < 2 {
            info!(stage = "reasoning", entities = entities.len(), "not enough entities to reason");
            return Vec::new();
        }
        let mut chains = Vec::new();
        for pair in entities.windows(2) {
            let (from, to) = (&pair[0], &pair[1]);
            if let Some(path) = self.reason(from, to, max_hops).await.into_iter().next() {
                chains.push(ReasoningChain { from: from.clone(), to: to.clone(), path });
            }
        }
        info!(stage = "reasoning", chains = chains.len(), "reasoning chains built");
        chains
    }
}

/// Weighted path score in `[0, 1]`. A path without relationships gets a
/// relation term of 0.
pub fn score_path(path: &Path, significant_relations: &[String]) -> f64 {
    let hops = path.relationships.len();
    let length_term = 1.0 / (hops as f64 + 1.0);
    let relation_term = if hops == 0 {
        0.0
    } else {
        let significant = path
            .relationships
            .iter()
            .filter(|r| significant_relations.iter().any(|s| *s == r.rel_type))
            .count();
        significant as f64 / hops as f64
    };
    LENGTH_WEIGHT * length_term + RELATION_WEIGHT * relation_term
}
