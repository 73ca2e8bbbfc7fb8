//! Self-consistency: repeated retrieval plus majority voting.
//!
//! Each sample runs the full extract → match → expand chain. Samples are
//! independent, so they may run concurrently; tallying starts only once
//! all of them are in.
//!
//! | Item | Key |
//! |------|-----|
//! | Node | `(type, name)` |
//! | Relationship | `(from_name, to_name, type)` |
//! | Path | description |
//!
//! A key counts at most once per sample. Keys seen in at least
//! `⌊n/2⌋ + 1` samples survive, carrying `consistency = count / n` on
//! their first-seen representative. Nodes that share a key under different
//! store ids keep the first-seen id; retained relationships and paths are
//! rebound to it, and any still pointing outside the kept nodes are dropped.

use std::hash::Hash;
use std::time::Instant;

use futures::future::join_all;
use hashbrown::{HashMap, HashSet};
use serde::Serialize;
use tracing::info;

use crate::generator::Generator;
use crate::model::{NodeId, Relationship, Subgraph};
use crate::storage::{GraphStore, HopBound};
use super::Pipeline;

/// Output of [`ConsistencyAggregator::self_consistency_retrieve`].
#[derive(Debug, Clone, Serialize)]
pub struct ConsistentRetrieval {
    pub consistent_subgraph: Subgraph,
    pub raw_samples: Vec<Subgraph>,
}

pub struct ConsistencyAggregator<'a, S, G> {
    pipeline: &'a Pipeline<S, G>,
}

impl<'a, S: GraphStore, G: Generator> ConsistencyAggregator<'a, S, G> {
    pub(super) fn new(pipeline: &'a Pipeline<S, G>) -> Self {
        Self { pipeline }
    }

    pub async fn self_consistency_retrieve(&self, query: &str, num_samples: usize) -> ConsistentRetrieval {
        let started = Instant::now();
        let num_samples = num_samples.max(1);
        let settings = self.pipeline.settings();
        let depth = HopBound::clamped(settings.max_depth);
        let top_k = settings.sample_top_k;
        let retriever = self.pipeline.retriever();

        let raw_samples = if settings.concurrent_samples {
            join_all((0..num_samples).map(|_| retriever.retrieve(query, depth, top_k))).await
        } else {
            let mut samples = Vec::with_capacity(num_samples);
            for _ in 0..num_samples {
                samples.push(retriever.retrieve(query, depth, top_k).await);
            }
            samples
        };

        let consistent_subgraph = aggregate(&raw_samples);
        info!(
            stage = "consistency",
            samples = num_samples,
            threshold = majority_threshold(num_samples),
            nodes = consistent_subgraph.node_count(),
            relationships = consistent_subgraph.relationships.len(),
            paths = consistent_subgraph.paths.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "consistent subgraph built"
        );
        ConsistentRetrieval { consistent_subgraph, raw_samples }
    }
}

/// Strict majority of `num_samples`.
pub fn majority_threshold(num_samples: usize) -> usize {
    num_samples / 2 + 1
}

/// Majority-vote a set of samples into one subgraph.
pub fn aggregate(samples: &[Subgraph]) -> Subgraph {
    let n = samples.len();
    let mut consistent = Subgraph::new();
    if n == 0 {
        return consistent;
    }
    let threshold = majority_threshold(n);

    let mut nodes = Tally::default();
    let mut relationships = Tally::default();
    let mut paths = Tally::default();
    for sample in samples {
        nodes.observe(sample.nodes().iter().map(|node| ((node.label.as_str(), node.name.as_str()), node)));
        relationships.observe(sample.relationships.iter().map(|r| {
            ((r.from_name.as_str(), r.to_name.as_str(), r.rel_type.as_str()), r)
        }));
        paths.observe(sample.paths.iter().map(|p| (p.description.as_str(), p)));
    }

    // Store nodes sharing a (type, name) key collapse onto the first-seen id.
    let mut representative: HashMap<(&str, &str), NodeId> = HashMap::new();
    let mut canonical: HashMap<NodeId, NodeId> = HashMap::new();
    for node in samples.iter().flat_map(|s| s.nodes()) {
        let rep = *representative.entry((node.label.as_str(), node.name.as_str())).or_insert(node.id);
        canonical.entry(node.id).or_insert(rep);
    }
    let canon = |id: NodeId| canonical.get(&id).copied().unwrap_or(id);

    for (count, node) in nodes.retained(threshold) {
        let mut node = node.clone();
        node.consistency = Some(count as f64 / n as f64);
        consistent.insert_node(node);
    }
    for (count, rel) in relationships.retained(threshold) {
        let mut rel = rel.clone();
        rebind(&mut rel, canon);
        if !(consistent.contains_node(rel.from_id) && consistent.contains_node(rel.to_id)) {
            continue;
        }
        rel.consistency = Some(count as f64 / n as f64);
        consistent.relationships.push(rel);
    }
    for (count, path) in paths.retained(threshold) {
        let mut path = path.clone();
        for node in &mut path.nodes {
            node.id = canon(node.id);
        }
        for rel in &mut path.relationships {
            rebind(rel, canon);
        }
        if !path.nodes.iter().all(|node| consistent.contains_node(node.id)) {
            continue;
        }
        path.consistency = Some(count as f64 / n as f64);
        consistent.paths.push(path);
    }
    consistent
}

fn rebind(rel: &mut Relationship, canon: impl Fn(NodeId) -> NodeId) {
    rel.from_id = canon(rel.from_id);
    rel.to_id = canon(rel.to_id);
}

/// Occurrence counts plus the first-seen representative of each key.
struct Tally<'a, K, T> {
    counts: HashMap<K, usize>,
    order: Vec<(K, &'a T)>,
}

impl<K, T> Default for Tally<'_, K, T> {
    fn default() -> Self {
        Self { counts: HashMap::new(), order: Vec::new() }
    }
}

impl<'a, K: Hash + Eq + Copy, T> Tally<'a, K, T> {
    /// Count every distinct key of one sample once.
    fn observe(&mut self, items: impl Iterator<Item = (K, &'a T)>) {
        let mut in_sample = HashSet::new();
        for (key, item) in items {
            if !in_sample.insert(key) {
                continue;
            }
            let count = self.counts.entry(key).or_insert(0);
            if *count == 0 {
                self.order.push((key, item));
            }
            *count += 1;
        }
    }

    fn retained(self, threshold: usize) -> impl Iterator<Item = (usize, &'a T)> {
        let counts = self.counts;
        self.order.into_iter().filter_map(move |(key, item)| {
            let count = counts.get(&key).copied().unwrap_or(0);
            (count >= threshold).then_some((count, item))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, Path};

    fn sample(names: &[(u64, &str)]) -> Subgraph {
        let mut sg = Subgraph::new();
        for (id, name) in names {
            sg.insert_node(Node::new(NodeId(*id), "Disease", *name));
        }
        sg
    }

    #[test]
    fn test_threshold() {
        assert_eq!(majority_threshold(1), 1);
        assert_eq!(majority_threshold(2), 2);
        assert_eq!(majority_threshold(3), 2);
        assert_eq!(majority_threshold(4), 3);
    }

    #[test]
    fn test_single_sample_keeps_everything() {
        let sg = aggregate(&[sample(&[(1, "A"), (2, "B")])]);
        assert_eq!(sg.node_count(), 2);
        assert!(sg.nodes().iter().all(|n| n.consistency == Some(1.0)));
    }

    #[test]
    fn test_relationship_counted_once_per_sample() {
        let a = Node::new(NodeId(1), "Disease", "A");
        let b = Node::new(NodeId(2), "Drug", "B");
        let rel = Relationship::new((a.id, "A"), (b.id, "B"), "R");
        let mut repeated = sample(&[]);
        repeated.insert_node(a.clone());
        repeated.insert_node(b.clone());
        repeated.relationships = vec![rel.clone(), rel.clone()];
        repeated.paths.push(Path::new(vec![a, b], vec![rel]).unwrap());

        let sg = aggregate(&[repeated.clone(), sample(&[])]);
        assert!(sg.relationships.is_empty());

        let sg = aggregate(&[repeated.clone(), repeated]);
        assert_eq!(sg.relationships.len(), 1);
        assert_eq!(sg.relationships[0].consistency, Some(1.0));
        assert_eq!(sg.paths[0].consistency, Some(1.0));
    }

    #[test]
    fn test_first_seen_order() {
        let sg = aggregate(&[
            sample(&[(2, "B"), (1, "A")]),
            sample(&[(1, "A"), (2, "B")]),
        ]);
        let names: Vec<_> = sg.nodes().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn test_same_named_nodes_rebound_to_kept_id() {
        let first = sample(&[(1, "A"), (2, "B")]);
        let twin = Node::new(NodeId(7), "Disease", "A");
        let b = Node::new(NodeId(2), "Disease", "B");
        let rel = Relationship::new((twin.id, "A"), (b.id, "B"), "R");
        let mut linked = sample(&[(7, "A"), (2, "B")]);
        linked.relationships.push(rel.clone());
        linked.paths.push(Path::new(vec![twin, b], vec![rel]).unwrap());

        let sg = aggregate(&[first, linked.clone(), linked]);

        let ids: Vec<_> = sg.nodes().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![NodeId(1), NodeId(2)]);
        assert_eq!(sg.relationships.len(), 1);
        assert_eq!(sg.relationships[0].from_id, NodeId(1));
        assert_eq!(sg.paths.len(), 1);
        assert!(sg.paths[0].nodes.iter().all(|n| sg.contains_node(n.id)));
        assert_eq!(sg.paths[0].relationships[0].from_id, NodeId(1));
    }

    #[test]
    fn test_no_samples() {
        assert!(aggregate(&[]).is_empty());
    }
}
