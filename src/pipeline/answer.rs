//! Allow-list constrained answer generation.
//!
//! The subgraph and reasoning chains are rendered into a text context, the
//! names and triples they contain become an allow-list, and the generator
//! is instructed to stay inside it. Nothing is rewritten afterwards: the
//! builder only reports which allowed names the answer uses.

use std::collections::HashSet;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::generator::{GenerationRequest, Generator};
use crate::matching::NameMatcher;
use crate::model::{Node, Subgraph};
use crate::storage::GraphStore;
use super::{Pipeline, ReasoningChain, RetrievalSettings};

/// Names and `"from → type → to"` triples an answer may reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AllowList {
    pub entities: Vec<String>,
    pub relations: Vec<String>,
}

impl AllowList {
    /// Deduplicated in first-seen order; relations capped at `max_relations`.
    pub fn from_subgraph(subgraph: &Subgraph, max_relations: usize) -> Self {
        let entities = subgraph.node_names().into_iter().map(str::to_string).collect();
        let mut seen = HashSet::new();
        let relations = subgraph
            .relationships
            .iter()
            .map(|r| r.triple())
            .filter(|t| seen.insert(t.clone()))
            .take(max_relations)
            .collect();
        Self { entities, relations }
    }

    /// Allowed entity names occurring in `text`.
    pub fn used_in(&self, text: &str, matcher: &dyn NameMatcher) -> Vec<String> {
        self.entities
            .iter()
            .filter(|name| matcher.matches(text, name))
            .cloned()
            .collect()
    }
}

/// Output of [`ConstrainedAnswerBuilder::build`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuiltAnswer {
    pub answer: String,
    pub used_entities: Vec<String>,
    pub used_fallback: bool,
}

pub struct ConstrainedAnswerBuilder<'a, S, G> {
    pipeline: &'a Pipeline<S, G>,
}

impl<'a, S: GraphStore, G: Generator> ConstrainedAnswerBuilder<'a, S, G> {
    pub(super) fn new(pipeline: &'a Pipeline<S, G>) -> Self {
        Self { pipeline }
    }

    pub async fn build(
        &self,
        query: &str,
        subgraph: &Subgraph,
        chains: &[ReasoningChain],
        consistency_note: &str,
    ) -> BuiltAnswer {
        let started = Instant::now();
        let settings = self.pipeline.settings();
        let allow = AllowList::from_subgraph(subgraph, settings.max_allowed_relations);
        let context = render_context(subgraph, chains, settings);
        let prompt = constrained_prompt(query, &context, consistency_note, &allow);

        let request = GenerationRequest::new(prompt, settings.answer_max_tokens, settings.answer_temperature);
        let (answer, used_fallback) = match self.pipeline.generator().generate(&request).await {
            Ok(text) => (text, false),
            Err(e) => {
                warn!(stage = "answer", error = %e, "generation failed, using templated answer");
                (fallback_answer(subgraph, settings), true)
            }
        };

        let used_entities = allow.used_in(&answer, self.pipeline.matcher());
        info!(
            stage = "answer",
            allowed_entities = allow.entities.len(),
            allowed_relations = allow.relations.len(),
            used_entities = used_entities.len(),
            used_fallback,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "answer built"
        );
        BuiltAnswer { answer, used_entities, used_fallback }
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Structured text context: entities grouped by type, paths with the most
/// consistent first, then reasoning chains step by step.
pub fn render_context(subgraph: &Subgraph, chains: &[ReasoningChain], settings: &RetrievalSettings) -> String {
    let mut out = String::from("[Relevant entities]\n");

    let mut groups: Vec<(&str, Vec<&Node>)> = Vec::new();
    for node in subgraph.nodes() {
        match groups.iter_mut().find(|(label, _)| *label == node.label) {
            Some((_, members)) => members.push(node),
            None => groups.push((node.label.as_str(), vec![node])),
        }
    }
    for (label, members) in groups {
        out.push_str(&format!("\n{label}:\n"));
        for node in members.into_iter().take(settings.max_nodes_per_type) {
            out.push_str(&format!("  - {}", node.name));
            let props: Vec<String> = node
                .descriptive_properties()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect();
            if !props.is_empty() {
                out.push_str(&format!(" ({})", props.join(", ")));
            }
            push_consistency(&mut out, node.consistency);
            out.push('\n');
        }
    }

    out.push_str("\n[Knowledge links]\n");
    let mut paths: Vec<_> = subgraph.paths.iter().take(settings.max_context_paths).collect();
    paths.sort_by(|a, b| b.consistency.unwrap_or(0.0).total_cmp(&a.consistency.unwrap_or(0.0)));
    for path in paths {
        out.push_str(&format!("  {}", path.description));
        push_consistency(&mut out, path.consistency);
        out.push('\n');
    }

    if !chains.is_empty() {
        out.push_str("\n[Reasoning chains]\n");
        for chain in chains {
            out.push_str(&format!("\nFrom {} to {}:\n", chain.from, chain.to));
            for (i, rel) in chain.path.relationships.iter().enumerate() {
                out.push_str(&format!(
                    "  Step {}: {} --[{}]--> {}\n",
                    i + 1,
                    rel.from_name,
                    rel.rel_type,
                    rel.to_name
                ));
            }
        }
    }
    out
}

fn push_consistency(out: &mut String, consistency: Option<f64>) {
    if let Some(c) = consistency.filter(|c| *c > 0.0) {
        out.push_str(&format!(" [consistency: {:.0}%]", c * 100.0));
    }
}

fn constrained_prompt(query: &str, context: &str, consistency_note: &str, allow: &AllowList) -> String {
    format!(
        "You are a knowledge-graph question answering assistant. Answer using only the \
         knowledge graph information provided.\n\n\
         [Hard constraints, follow strictly]\n\
         1. Only reference entities from this list:\n   {entities}\n\n\
         2. Only use these verified relations:\n   {relations}\n\n\
         3. Every entity you mention must come from the allowed list.\n\
         4. If the knowledge graph information is insufficient, say explicitly that the \
         graph has no related information.\n\
         5. Include entity properties (dose, timing, frequency and so on) where relevant.\n\n\
         {consistency_note}\n\n\
         [Knowledge graph information]\n{context}\n\
         [Question]\n{query}\n\n\
         [Answer format]\n\
         1. Core answer: one or two sentences.\n\
         2. Details: point by point, citing specific entities and relations.\n\
         3. Notes: any important caveats.\n\n\
         Remember: every entity name must come from the allowed list.",
        entities = allow.entities.join(", "),
        relations = allow.relations.join("\n   "),
    )
}

/// Deterministic answer built only from subgraph content.
pub fn fallback_answer(subgraph: &Subgraph, settings: &RetrievalSettings) -> String {
    if subgraph.nodes().is_empty() && subgraph.paths.is_empty() {
        return "No related information was found in the knowledge graph for this question.".to_string();
    }
    let mut out = String::from("[Answer from the knowledge graph]\n");
    if !subgraph.nodes().is_empty() {
        out.push_str("\nRelated entities:\n");
        for node in subgraph.nodes().iter().take(settings.fallback_nodes) {
            out.push_str(&format!("  - {} ({})\n", node.name, node.label));
        }
    }
    if !subgraph.paths.is_empty() {
        out.push_str("\nRelated knowledge:\n");
        for path in subgraph.paths.iter().take(settings.fallback_paths) {
            out.push_str(&format!("  - {}\n", path.description));
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::SubstringMatcher;
    use crate::model::{NodeId, Path, Relationship};

    fn subgraph() -> Subgraph {
        let a = Node::new(NodeId(1), "Disease", "flu").with_property("severity", "mild").with_property("note", "");
        let b = Node::new(NodeId(2), "Treatment", "rest");
        let rel = Relationship::new((a.id, "flu"), (b.id, "rest"), "TREATED_BY");
        let mut sg = Subgraph::new();
        sg.insert_node(a.clone());
        sg.insert_node(b.clone());
        sg.relationships = vec![rel.clone(), rel.clone()];
        sg.paths.push(Path::new(vec![a, b], vec![rel]).unwrap());
        sg
    }

    #[test]
    fn test_allow_list_dedups_triples() {
        let allow = AllowList::from_subgraph(&subgraph(), 20);
        assert_eq!(allow.entities, vec!["flu", "rest"]);
        assert_eq!(allow.relations, vec!["flu → TREATED_BY → rest"]);
        assert!(AllowList::from_subgraph(&subgraph(), 0).relations.is_empty());
    }

    #[test]
    fn test_used_entities() {
        let allow = AllowList::from_subgraph(&subgraph(), 20);
        assert_eq!(allow.used_in("get some rest", &SubstringMatcher), vec!["rest"]);
    }

    #[test]
    fn test_context_groups_and_properties() {
        let context = render_context(&subgraph(), &[], &RetrievalSettings::default());
        assert!(context.contains("Disease:\n  - flu (severity: mild)\n"));
        assert!(context.contains("Treatment:\n  - rest\n"));
        assert!(context.contains("  flu[TREATED_BY]->rest"));
        assert!(!context.contains("[Reasoning chains]"));
    }

    #[test]
    fn test_context_renders_chain_steps() {
        let sg = subgraph();
        let chain = ReasoningChain { from: "flu".into(), to: "rest".into(), path: sg.paths[0].clone() };
        let context = render_context(&sg, &[chain], &RetrievalSettings::default());
        assert!(context.contains("\nFrom flu to rest:\n  Step 1: flu --[TREATED_BY]--> rest\n"));
    }

    #[test]
    fn test_context_marks_consistency() {
        let mut sg = Subgraph::new();
        let mut node = Node::new(NodeId(1), "Disease", "flu");
        node.consistency = Some(2.0 / 3.0);
        sg.insert_node(node);
        let context = render_context(&sg, &[], &RetrievalSettings::default());
        assert!(context.contains("Disease:\n  - flu [consistency: 67%]\n"));
    }

    #[test]
    fn test_fallback_lists_nodes_and_paths() {
        let answer = fallback_answer(&subgraph(), &RetrievalSettings::default());
        assert!(answer.contains("  - flu (Disease)"));
        assert!(answer.contains("  - flu[TREATED_BY]->rest"));
    }

    #[test]
    fn test_fallback_on_empty_subgraph() {
        let answer = fallback_answer(&Subgraph::new(), &RetrievalSettings::default());
        assert!(answer.contains("No related information"));
    }
}
