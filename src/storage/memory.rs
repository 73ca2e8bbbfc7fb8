//! In-memory graph store.
//!
//! This is the reference implementation of `GraphStore`.
//! It uses simple HashMaps protected by RwLock.
//!
//! ## Limitations
//!
//! - **Full scans**: name lookups scan every node; there are no indexes.
//! - **Writes are a setup concern**: `create_node` / `create_relationship`
//!   exist to load fixtures and tests. The pipeline never calls them.
//!
//! Use this store for:
//! - Testing the retrieval pipeline without a database
//! - Serving a small fixture-backed graph (see [`MemoryStore::load_fixture`])

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use parking_lot::RwLock;
use async_trait::async_trait;
use serde::Deserialize;

use crate::model::*;
use crate::{Error, Result};
use super::{GraphStore, Hop, HopBound, Session, TraversalPath};

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory property graph.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

/// Lock order when more than one is held: `relationships`, `adjacency`, `nodes`.
struct MemoryInner {
    nodes: RwLock<HashMap<NodeId, Node>>,
    relationships: RwLock<Vec<StoredRel>>,
    /// node_id → indexes into `relationships`
    adjacency: RwLock<HashMap<NodeId, Vec<usize>>>,
    next_node_id: AtomicU64,
    next_session_id: AtomicU64,
    open_sessions: Arc<AtomicUsize>,
}

#[derive(Debug, Clone)]
struct StoredRel {
    src: NodeId,
    dst: NodeId,
    rel_type: String,
    properties: PropertyMap,
}

impl StoredRel {
    fn other(&self, from: NodeId) -> NodeId {
        if from == self.src { self.dst } else { self.src }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                nodes: RwLock::new(HashMap::new()),
                relationships: RwLock::new(Vec::new()),
                adjacency: RwLock::new(HashMap::new()),
                next_node_id: AtomicU64::new(1),
                next_session_id: AtomicU64::new(1),
                open_sessions: Arc::new(AtomicUsize::new(0)),
            }),
        }
    }

    /// Number of sessions currently held. Zero once every caller has
    /// dropped its session.
    pub fn open_sessions(&self) -> usize {
        self.inner.open_sessions.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Setup
    // ========================================================================

    /// Create a node with the given label, name and properties.
    pub fn create_node(
        &self,
        label: &str,
        name: &str,
        props: PropertyMap,
    ) -> NodeId {
        let id = NodeId(self.inner.next_node_id.fetch_add(1, Ordering::Relaxed));
        let mut node = Node::new(id, label, name);
        node.properties = props;
        node.properties.insert("name".into(), Value::from(name));

        self.inner.nodes.write().insert(id, node);
        self.inner.adjacency.write().insert(id, Vec::new());
        id
    }

    /// Create a relationship between two existing nodes.
    pub fn create_relationship(
        &self,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<()> {
        {
            let nodes = self.inner.nodes.read();
            if !nodes.contains_key(&src) {
                return Err(Error::InvalidArgument(format!("source node {src} does not exist")));
            }
            if !nodes.contains_key(&dst) {
                return Err(Error::InvalidArgument(format!("target node {dst} does not exist")));
            }
        }

        let mut rels = self.inner.relationships.write();
        let idx = rels.len();
        rels.push(StoredRel { src, dst, rel_type: rel_type.to_string(), properties: props });

        // Update adjacency for both endpoints
        let mut adj = self.inner.adjacency.write();
        adj.entry(src).or_default().push(idx);
        if src != dst {
            adj.entry(dst).or_default().push(idx);
        }
        Ok(())
    }

    /// Load a JSON fixture:
    ///
    /// ```json
    /// { "nodes": [{"key": "mi", "type": "疾病", "name": "心肌梗死", "properties": {}}],
    ///   "relationships": [{"from": "mi", "to": "pci", "type": "需要治疗", "properties": {}}] }
    /// ```
    pub fn load_fixture(reader: impl std::io::Read) -> Result<Self> {
        let fixture: Fixture = serde_json::from_reader(reader)?;
        let store = Self::new();
        let mut keys = HashMap::new();
        for node in fixture.nodes {
            let id = store.create_node(
                &node.label,
                &node.name,
                property_map::from_json(node.properties),
            );
            keys.insert(node.key, id);
        }
        for rel in fixture.relationships {
            let lookup = |key: &str| {
                keys.get(key).copied().ok_or_else(|| {
                    Error::Decode(format!("fixture relationship references unknown node '{key}'"))
                })
            };
            store.create_relationship(
                lookup(&rel.from)?,
                lookup(&rel.to)?,
                &rel.rel_type,
                property_map::from_json(rel.properties),
            )?;
        }
        Ok(store)
    }

    // ========================================================================
    // Traversal helpers
    // ========================================================================

    fn node(&self, id: NodeId) -> Option<Node> {
        self.inner.nodes.read().get(&id).cloned()
    }

    /// BFS from one start node: every simple path of length 1..=max_depth,
    /// shortest first, both directions.
    fn walk(&self, start: NodeId, max_depth: usize) -> Vec<TraversalPath> {
        let Some(start_node) = self.node(start) else {
            return Vec::new();
        };
        let rels = self.inner.relationships.read();
        let adj = self.inner.adjacency.read();

        let mut results = Vec::new();
        let mut queue = vec![TraversalPath { nodes: vec![start_node], hops: Vec::new() }];

        for current_depth in 0..max_depth {
            let mut next_queue = Vec::new();

            for path in &queue {
                let Some(tip) = path.nodes.last().map(|n| n.id) else { continue };
                let rel_idxs = adj.get(&tip).cloned().unwrap_or_default();

                for idx in rel_idxs {
                    let Some(rel) = rels.get(idx) else { continue };
                    let next_id = rel.other(tip);

                    // Avoid cycles
                    if path.nodes.iter().any(|n| n.id == next_id) {
                        continue;
                    }

                    if let Some(next_node) = self.node(next_id) {
                        let mut new_path = path.clone();
                        new_path.hops.push(Hop {
                            rel_type: rel.rel_type.clone(),
                            properties: rel.properties.clone(),
                        });
                        new_path.nodes.push(next_node);

                        if current_depth + 1 < max_depth {
                            next_queue.push(new_path.clone());
                        }
                        results.push(new_path);
                    }
                }
            }

            queue = next_queue;
            if queue.is_empty() { break; }
        }

        results
    }

    fn ids_matching(&self, fragment: &str) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .inner
            .nodes
            .read()
            .values()
            .filter(|n| n.name.contains(fragment))
            .map(|n| n.id)
            .collect();
        ids.sort();
        ids
    }
}

// ============================================================================
// MemorySession
// ============================================================================

/// In-memory session (a counted marker; there is nothing to isolate).
pub struct MemorySession {
    id: u64,
    open: Arc<AtomicUsize>,
}

impl Session for MemorySession {
    fn id(&self) -> u64 { self.id }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// GraphStore impl
// ============================================================================

#[async_trait]
impl GraphStore for MemoryStore {
    type Session = MemorySession;

    async fn verify_connectivity(&self) -> Result<()> { Ok(()) }

    async fn begin_session(&self) -> Result<MemorySession> {
        let id = self.inner.next_session_id.fetch_add(1, Ordering::Relaxed);
        self.inner.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(MemorySession { id, open: Arc::clone(&self.inner.open_sessions) })
    }

    async fn node_names(&self, _session: &MemorySession) -> Result<Vec<String>> {
        let nodes = self.inner.nodes.read();
        let mut ordered: Vec<&Node> = nodes.values().collect();
        ordered.sort_by_key(|n| n.id);
        let mut seen = HashSet::new();
        Ok(ordered
            .into_iter()
            .filter(|n| !n.name.is_empty() && seen.insert(n.name.as_str()))
            .map(|n| n.name.clone())
            .collect())
    }

    async fn find_nodes(
        &self,
        _session: &MemorySession,
        fragment: &str,
        limit: usize,
    ) -> Result<Vec<Node>> {
        Ok(self
            .ids_matching(fragment)
            .into_iter()
            .take(limit)
            .filter_map(|id| self.node(id))
            .collect())
    }

    async fn paths_from(
        &self,
        _session: &MemorySession,
        seeds: &[NodeId],
        depth: HopBound,
        limit: usize,
    ) -> Result<Vec<TraversalPath>> {
        let mut seen = HashSet::new();
        let mut paths: Vec<TraversalPath> = seeds
            .iter()
            .filter(|id| seen.insert(**id))
            .flat_map(|id| self.walk(*id, depth.get()))
            .collect();
        // Stable: per-seed BFS order is kept within each length.
        paths.sort_by_key(|p| p.len());
        paths.truncate(limit);
        Ok(paths)
    }

    async fn paths_between(
        &self,
        _session: &MemorySession,
        start: &str,
        end: &str,
        hops: HopBound,
        limit: usize,
    ) -> Result<Vec<TraversalPath>> {
        let mut paths: Vec<TraversalPath> = self
            .ids_matching(start)
            .into_iter()
            .flat_map(|id| self.walk(id, hops.get()))
            .filter(|p| p.nodes.last().is_some_and(|n| n.name.contains(end)))
            .collect();
        paths.sort_by_key(|p| p.len());
        paths.truncate(limit);
        Ok(paths)
    }

    async fn all_nodes(&self, _session: &MemorySession) -> Result<Vec<Node>> {
        let mut nodes: Vec<Node> = self.inner.nodes.read().values().cloned().collect();
        nodes.sort_by_key(|n| n.id);
        Ok(nodes)
    }

    async fn all_relationships(&self, _session: &MemorySession) -> Result<Vec<Relationship>> {
        let rels = self.inner.relationships.read();
        let nodes = self.inner.nodes.read();
        let name_of = |id: &NodeId| nodes.get(id).map(|n| n.name.clone()).unwrap_or_default();
        Ok(rels
            .iter()
            .map(|rel| Relationship {
                from_id: rel.src,
                from_name: name_of(&rel.src),
                to_id: rel.dst,
                to_name: name_of(&rel.dst),
                rel_type: rel.rel_type.clone(),
                properties: rel.properties.clone(),
                consistency: None,
            })
            .collect())
    }

    async fn node_count(&self, _session: &MemorySession) -> Result<u64> {
        Ok(self.inner.nodes.read().len() as u64)
    }

    async fn relationship_count(&self, _session: &MemorySession) -> Result<u64> {
        Ok(self.inner.relationships.read().len() as u64)
    }
}

// ============================================================================
// Fixture format
// ============================================================================

#[derive(Debug, Deserialize)]
struct Fixture {
    #[serde(default)]
    nodes: Vec<FixtureNode>,
    #[serde(default)]
    relationships: Vec<FixtureRel>,
}

#[derive(Debug, Deserialize)]
struct FixtureNode {
    key: String,
    #[serde(rename = "type")]
    label: String,
    name: String,
    #[serde(default)]
    properties: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct FixtureRel {
    from: String,
    to: String,
    #[serde(rename = "type")]
    rel_type: String,
    #[serde(default)]
    properties: serde_json::Value,
}

// ============================================================================
// Tests
// ============================================================================
