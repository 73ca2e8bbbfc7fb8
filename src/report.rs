//! User-facing shaping of a [`GroundedAnswer`].
//!
//! The full outcome carries every sample, path and claim check. Front ends
//! want a short answer with a confidence figure and a glimpse of where it
//! came from; this is that view.

use serde::Serialize;

use crate::pipeline::GroundedAnswer;

const MAX_RELEVANT_ENTITIES: usize = 10;
const MAX_KEY_PATHS: usize = 5;
const MAX_REASONING_SUMMARY: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserResponse {
    pub answer: String,
    /// Overall validation score as a percentage.
    pub confidence: f64,
    pub knowledge_source: KnowledgeSource,
    pub reasoning: ReasoningSummary,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeSource {
    pub entity_count: usize,
    pub relation_count: usize,
    pub relevant_entities: Vec<RelevantEntity>,
    pub key_paths: Vec<KeyPath>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelevantEntity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub consistency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyPath {
    pub description: String,
    pub consistency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReasoningSummary {
    pub has_reasoning: bool,
    pub chain_count: usize,
    pub summary: Vec<ChainSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainSummary {
    pub from: String,
    pub to: String,
    pub hops: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    pub query: String,
    pub total_nodes: usize,
    pub total_paths: usize,
    pub consistency_info: String,
}

impl UserResponse {
    pub fn from_outcome(outcome: &GroundedAnswer) -> Self {
        let subgraph = &outcome.subgraph;
        Self {
            answer: outcome.answer.clone(),
            confidence: outcome.validation.overall_score * 100.0,
            knowledge_source: KnowledgeSource {
                entity_count: subgraph.node_count(),
                relation_count: subgraph.relationships.len(),
                relevant_entities: subgraph
                    .nodes()
                    .iter()
                    .take(MAX_RELEVANT_ENTITIES)
                    .map(|n| RelevantEntity {
                        name: n.name.clone(),
                        entity_type: n.label.clone(),
                        consistency: n.consistency.unwrap_or(0.0),
                    })
                    .collect(),
                key_paths: subgraph
                    .paths
                    .iter()
                    .take(MAX_KEY_PATHS)
                    .map(|p| KeyPath {
                        description: p.description.clone(),
                        consistency: p.consistency.unwrap_or(0.0),
                    })
                    .collect(),
            },
            reasoning: ReasoningSummary {
                has_reasoning: !outcome.reasoning_chains.is_empty(),
                chain_count: outcome.reasoning_chains.len(),
                summary: outcome
                    .reasoning_chains
                    .iter()
                    .take(MAX_REASONING_SUMMARY)
                    .map(|c| ChainSummary { from: c.from.clone(), to: c.to.clone(), hops: c.path.length })
                    .collect(),
            },
            metadata: Metadata {
                query: outcome.query.clone(),
                total_nodes: subgraph.node_count(),
                total_paths: subgraph.paths.len(),
                consistency_info: outcome.consistency_note.trim().to_string(),
            },
        }
    }
}
