//! One retrieval sample: extract → match → expand.

use tracing::debug;

use crate::generator::Generator;
use crate::model::Subgraph;
use crate::storage::{GraphStore, HopBound};
use super::Pipeline;

pub struct Retriever<'a, S, G> {
    pipeline: &'a Pipeline<S, G>,
}

impl<'a, S: GraphStore, G: Generator> Retriever<'a, S, G> {
    pub(super) fn new(pipeline: &'a Pipeline<S, G>) -> Self {
        Self { pipeline }
    }

    pub async fn retrieve(&self, query: &str, depth: HopBound, top_k: usize) -> Subgraph {
        let entities = self.pipeline.extractor().extract(query).await;
        let seeds = self.pipeline.node_matcher().match_entities(&entities).await;
        if seeds.is_empty() {
            debug!(stage = "retrieve", "no seed nodes, skipping expansion");
            return Subgraph::new();
        }
        self.pipeline.expander().expand(&seeds, depth, top_k).await
    }
}
