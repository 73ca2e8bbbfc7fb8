//! Post-hoc grounding check of a generated answer.

use std::collections::HashSet;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::generator::Generator;
use crate::matching::NameMatcher;
use crate::model::Subgraph;
use crate::storage::GraphStore;
use super::{EntityScope, Pipeline};

/// Sentence terminators used to split an answer into claims.
const FULL_STOPS: [char; 2] = ['。', '.'];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaimCheck {
    pub claim: String,
    pub verified: bool,
    pub supporting_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    /// `0.5 · entity_consistency + 0.5 · claim_consistency`, in `[0, 1]`.
    pub overall_score: f64,
    pub entity_consistency: f64,
    pub claim_consistency: f64,
    pub valid_entities: Vec<String>,
    /// Known names used by the answer but absent from the subgraph.
    pub invalid_entities: Vec<String>,
    pub verified_claims: Vec<ClaimCheck>,
}

pub struct AnswerValidator<'a, S, G> {
    pipeline: &'a Pipeline<S, G>,
}

impl<'a, S: GraphStore, G: Generator> AnswerValidator<'a, S, G> {
    pub(super) fn new(pipeline: &'a Pipeline<S, G>) -> Self {
        Self { pipeline }
    }

    pub async fn validate(&self, answer: &str, subgraph: &Subgraph) -> ValidationResult {
        let started = Instant::now();
        let universe = match self.pipeline.settings().entity_scope {
            EntityScope::Store => self.store_names().await,
            EntityScope::Subgraph => subgraph.node_names().into_iter().map(str::to_string).collect(),
        };

        let result = assess(answer, subgraph, &universe, self.pipeline.matcher());
        info!(
            stage = "validate",
            entities = result.valid_entities.len() + result.invalid_entities.len(),
            invalid = result.invalid_entities.len(),
            claims = result.verified_claims.len(),
            overall_score = result.overall_score,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "answer validated"
        );
        result
    }

    async fn store_names(&self) -> Vec<String> {
        let Some(session) = self.pipeline.session("validate").await else {
            return Vec::new();
        };
        match self.pipeline.store().node_names(&session).await {
            Ok(names) => names,
            Err(e) => {
                warn!(stage = "validate", error = %e, "store name scan failed");
                Vec::new()
            }
        }
    }
}

/// Score `answer` against `subgraph`, looking for the names in `universe`.
pub fn assess(
    answer: &str,
    subgraph: &Subgraph,
    universe: &[String],
    matcher: &dyn NameMatcher,
) -> ValidationResult {
    let in_subgraph: HashSet<&str> = subgraph.node_names().into_iter().collect();

    let mut seen = HashSet::new();
    let (valid_entities, invalid_entities): (Vec<String>, Vec<String>) = universe
        .iter()
        .filter(|name| seen.insert(name.as_str()) && matcher.matches(answer, name))
        .cloned()
        .partition(|name| in_subgraph.contains(name.as_str()));

    let verified_claims: Vec<ClaimCheck> = split_claims(answer)
        .into_iter()
        .map(|claim| {
            let support = subgraph.paths.iter().find(|path| {
                path.nodes.iter().take(2).any(|node| matcher.matches(claim, &node.name))
            });
            ClaimCheck {
                claim: claim.to_string(),
                verified: support.is_some(),
                supporting_path: support.map(|p| p.description.clone()),
            }
        })
        .collect();

    let found = valid_entities.len() + invalid_entities.len();
    let entity_consistency = ratio(valid_entities.len(), found);
    let claim_consistency = ratio(
        verified_claims.iter().filter(|c| c.verified).count(),
        verified_claims.len(),
    );

    ValidationResult {
        overall_score: 0.5 * entity_consistency + 0.5 * claim_consistency,
        entity_consistency,
        claim_consistency,
        valid_entities,
        invalid_entities,
        verified_claims,
    }
}

/// Sentences of `text`, split on full stops, trimmed, blanks dropped.
pub fn split_claims(text: &str) -> Vec<&str> {
    text.split(FULL_STOPS.as_slice())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 { 0.0 } else { part as f64 / whole as f64 }
}
