//! # Retrieval Pipeline
//!
//! ```text
//! query ─► EntityExtractor ─► NodeMatcher ─► SubgraphExpander ─┐
//!              (Retriever, optionally ×N + ConsistencyAggregator) │
//!                                                                ▼
//!          PathReasoner chains ─► ConstrainedAnswerBuilder ─► AnswerValidator
//! ```
//!
//! [`Pipeline`] owns the injected store, generator and name matcher.
//! Components are cheap views borrowing from it, so each can be driven on
//! its own (tests, diagnostics) or through [`Pipeline::answer`].
//!
//! Failures inside a request never escape a component: store errors are
//! logged and read as "no results", generator errors select the
//! deterministic path.

pub mod settings;
mod extract;
mod nodes;
mod expand;
mod retrieve;
mod consistency;
mod reasoning;
mod answer;
mod validate;

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::generator::Generator;
use crate::matching::NameMatcher;
use crate::model::Subgraph;
use crate::storage::{GraphStore, HopBound};
use crate::{Error, Result};

pub use settings::{EntityScope, RetrievalSettings};
pub use crate::matching::MatcherKind;
pub use extract::{EntityExtractor, parse_entity_list};
pub use nodes::NodeMatcher;
pub use expand::SubgraphExpander;
pub use retrieve::Retriever;
pub use consistency::{ConsistencyAggregator, ConsistentRetrieval, aggregate, majority_threshold};
pub use reasoning::{PathReasoner, ReasoningChain, ReasoningOutcome, score_path};
pub use answer::{AllowList, BuiltAnswer, ConstrainedAnswerBuilder, fallback_answer, render_context};
pub use validate::{AnswerValidator, ClaimCheck, ValidationResult, assess, split_claims};

// ============================================================================
// Options and outcome
// ============================================================================

/// Optional stages of [`Pipeline::answer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineOptions {
    /// Retrieve `num_samples` times and keep the majority subgraph.
    pub use_consistency: bool,
    /// Search reasoning paths between adjacent query entities.
    pub use_reasoning: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self { use_consistency: true, use_reasoning: true }
    }
}

/// Everything produced for one query.
#[derive(Debug, Clone, Serialize)]
pub struct GroundedAnswer {
    pub query: String,
    pub answer: String,
    pub subgraph: Subgraph,
    pub reasoning_chains: Vec<ReasoningChain>,
    pub validation: ValidationResult,
    /// Allow-listed entity names that occur in `answer`.
    pub used_entities: Vec<String>,
    /// Empty unless self-consistency retrieval ran.
    pub consistency_note: String,
    /// Per-sample subgraphs; empty unless self-consistency retrieval ran.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub raw_samples: Vec<Subgraph>,
    /// The templated answer was used instead of the generator.
    pub used_fallback: bool,
}

// ============================================================================
// Pipeline
// ============================================================================

/// The orchestrator. Cheap to clone; collaborators are shared.
pub struct Pipeline<S, G> {
    store: Arc<S>,
    generator: Arc<G>,
    matcher: Arc<dyn NameMatcher>,
    settings: RetrievalSettings,
}

impl<S, G> Clone for Pipeline<S, G> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            generator: Arc::clone(&self.generator),
            matcher: Arc::clone(&self.matcher),
            settings: self.settings.clone(),
        }
    }
}

impl<S: GraphStore, G: Generator> Pipeline<S, G> {
    /// Build a pipeline without probing the store.
    pub fn new(store: S, generator: G, settings: RetrievalSettings) -> Result<Self> {
        settings.validate()?;
        let matcher: Arc<dyn NameMatcher> = Arc::from(settings.matcher.build());
        Ok(Self {
            store: Arc::new(store),
            generator: Arc::new(generator),
            matcher,
            settings,
        })
    }

    /// Build a pipeline after checking that the store is reachable.
    pub async fn connect(store: S, generator: G, settings: RetrievalSettings) -> Result<Self> {
        store.verify_connectivity().await.map_err(|e| match e {
            Error::StoreUnavailable(_) => e,
            other => Error::StoreUnavailable(other.to_string()),
        })?;
        info!("graph store reachable");
        Self::new(store, generator, settings)
    }

    /// Replace the configured name matcher.
    pub fn with_matcher(mut self, matcher: impl NameMatcher + 'static) -> Self {
        self.matcher = Arc::new(matcher);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn matcher(&self) -> &dyn NameMatcher {
        self.matcher.as_ref()
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    // ========================================================================
    // Components
    // ========================================================================

    pub fn extractor(&self) -> EntityExtractor<'_, S, G> {
        EntityExtractor::new(self)
    }

    pub fn node_matcher(&self) -> NodeMatcher<'_, S, G> {
        NodeMatcher::new(self)
    }

    pub fn expander(&self) -> SubgraphExpander<'_, S, G> {
        SubgraphExpander::new(self)
    }

    pub fn retriever(&self) -> Retriever<'_, S, G> {
        Retriever::new(self)
    }

    pub fn aggregator(&self) -> ConsistencyAggregator<'_, S, G> {
        ConsistencyAggregator::new(self)
    }

    pub fn reasoner(&self) -> PathReasoner<'_, S, G> {
        PathReasoner::new(self)
    }

    pub fn answer_builder(&self) -> ConstrainedAnswerBuilder<'_, S, G> {
        ConstrainedAnswerBuilder::new(self)
    }

    pub fn validator(&self) -> AnswerValidator<'_, S, G> {
        AnswerValidator::new(self)
    }

    /// Open a session for one stage, or log and give up.
    pub(crate) async fn session(&self, stage: &'static str) -> Option<S::Session> {
        match self.store.begin_session().await {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(stage, error = %e, "could not open a store session");
                None
            }
        }
    }

    // ========================================================================
    // End-to-end
    // ========================================================================

    /// Retrieve, optionally vote and reason, answer under the allow-list,
    /// then validate the answer against the subgraph.
    pub async fn answer(&self, query: &str, options: PipelineOptions) -> Result<GroundedAnswer> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidArgument("query must not be empty".into()));
        }
        let started = Instant::now();

        let (subgraph, raw_samples, consistency_note) = if options.use_consistency {
            let retrieval = self
                .aggregator()
                .self_consistency_retrieve(query, self.settings.num_samples)
                .await;
            let note = consistency_note(&retrieval.consistent_subgraph);
            (retrieval.consistent_subgraph, retrieval.raw_samples, note)
        } else {
            let subgraph = self
                .retriever()
                .retrieve(query, self.settings.depth(), self.settings.top_k)
                .await;
            (subgraph, Vec::new(), String::new())
        };

        let reasoning_chains = if options.use_reasoning {
            let entities = self.extractor().extract(query).await;
            self.reasoner()
                .chains(&entities, HopBound::clamped(self.settings.max_hops))
                .await
        } else {
            Vec::new()
        };

        let built = self
            .answer_builder()
            .build(query, &subgraph, &reasoning_chains, &consistency_note)
            .await;
        let validation = self.validator().validate(&built.answer, &subgraph).await;

        info!(
            stage = "pipeline",
            nodes = subgraph.node_count(),
            paths = subgraph.paths.len(),
            chains = reasoning_chains.len(),
            overall_score = validation.overall_score,
            used_fallback = built.used_fallback,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "query answered"
        );

        Ok(GroundedAnswer {
            query: query.to_string(),
            answer: built.answer,
            subgraph,
            reasoning_chains,
            validation,
            used_entities: built.used_entities,
            consistency_note,
            raw_samples,
            used_fallback: built.used_fallback,
        })
    }

    /// Reason from the first to the last entity of `query`.
    ///
    /// `None` when fewer than two entities are extracted.
    pub async fn multi_hop_reasoning(&self, query: &str, max_hops: HopBound) -> Option<ReasoningOutcome> {
        let entities = self.extractor().extract(query).await;
        let (Some(start), Some(end)) = (entities.first(), entities.last()) else {
            return None;
        };
        if entities.len() < 2 {
            info!(stage = "reasoning", entities = entities.len(), "not enough entities to reason");
            return None;
        }
        let paths = self.reasoner().reason(start, end, max_hops).await;
        Some(ReasoningOutcome { start: start.clone(), end: end.clone(), paths })
    }
}

/// Summary of a voted subgraph, handed to the generator as context.
pub fn consistency_note(subgraph: &Subgraph) -> String {
    format!(
        "Consistency analysis:\n\
         - high-consistency nodes: {}\n\
         - high-consistency paths: {}\n\
         - mean consistency: {:.2}%",
        subgraph.node_count(),
        subgraph.paths.len(),
        subgraph.mean_consistency() * 100.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::Unconfigured;
    use crate::model::{Node, NodeId};
    use crate::storage::MemoryStore;

    #[test]
    fn test_consistency_note_counts() {
        let mut sg = Subgraph::new();
        let mut a = Node::new(NodeId(1), "Disease", "A");
        a.consistency = Some(1.0);
        let mut b = Node::new(NodeId(2), "Disease", "B");
        b.consistency = Some(0.5);
        sg.insert_node(a);
        sg.insert_node(b);
        let note = consistency_note(&sg);
        assert!(note.contains("high-consistency nodes: 2"));
        assert!(note.contains("mean consistency: 75.00%"));
    }

    #[tokio::test]
    async fn test_blank_query_rejected() {
        let pipeline = Pipeline::new(MemoryStore::new(), Unconfigured, RetrievalSettings::default()).unwrap();
        let err = pipeline.answer("   ", PipelineOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let settings = RetrievalSettings { top_k: 0, ..Default::default() };
        assert!(Pipeline::new(MemoryStore::new(), Unconfigured, settings).is_err());
    }
}
