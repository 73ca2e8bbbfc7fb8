//! # Graph Store Trait
//!
//! This is THE contract between the retrieval pipeline and the graph store.
//! The pipeline is read-only: it looks nodes up, asks for bounded
//! traversals and consumes result sets. It never writes.
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryStore` | `memory` | In-process graph for testing/embedding |
//! | `Neo4jHttpStore` | `neo4j_http` | Neo4j via the HTTP transactional Cypher endpoint |

pub mod memory;
pub mod neo4j_http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::model::*;
use crate::{Error, Result};

pub use memory::MemoryStore;
pub use neo4j_http::Neo4jHttpStore;

// ============================================================================
// Hop bound
// ============================================================================

/// Maximum traversal length, validated at construction.
///
/// Variable-length patterns cannot take their bound as a query parameter,
/// so this is the only value ever spliced into traversal text. It can only
/// hold `1..=HopBound::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct HopBound(usize);

impl HopBound {
    pub const MAX: usize = 6;

    pub fn new(hops: usize) -> Result<Self> {
        if (1..=Self::MAX).contains(&hops) {
            Ok(Self(hops))
        } else {
            Err(Error::InvalidArgument(format!(
                "hop bound must be within 1..={}, got {hops}",
                Self::MAX
            )))
        }
    }

    /// Clamp any value into the valid range.
    pub fn clamped(hops: usize) -> Self {
        Self(hops.clamp(1, Self::MAX))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl TryFrom<usize> for HopBound {
    type Error = Error;
    fn try_from(hops: usize) -> Result<Self> {
        Self::new(hops)
    }
}

impl From<HopBound> for usize {
    fn from(bound: HopBound) -> usize {
        bound.0
    }
}

impl std::fmt::Display for HopBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Traversal result shapes
// ============================================================================

/// One relationship step of a traversal, without endpoint information.
/// `hops[i]` connects `nodes[i]` to `nodes[i + 1]` in traversal order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hop {
    #[serde(rename = "type")]
    pub rel_type: String,
    #[serde(default)]
    pub properties: PropertyMap,
}

impl Hop {
    pub fn new(rel_type: impl Into<String>) -> Self {
        Self { rel_type: rel_type.into(), properties: PropertyMap::new() }
    }
}

/// A path as returned by the store: ordered nodes and the hops between them.
#[derive(Debug, Clone, PartialEq)]
pub struct TraversalPath {
    pub nodes: Vec<Node>,
    pub hops: Vec<Hop>,
}

impl TraversalPath {
    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// Convert into a pipeline [`Path`], emitting one [`Relationship`] per
    /// adjacent node pair. `None` if the shape is inconsistent.
    pub fn into_path(self) -> Option<Path> {
        if self.nodes.len() != self.hops.len() + 1 {
            return None;
        }
        let relationships = self
            .hops
            .into_iter()
            .enumerate()
            .map(|(i, hop)| {
                let from = &self.nodes[i];
                let to = &self.nodes[i + 1];
                Relationship {
                    from_id: from.id,
                    from_name: from.name.clone(),
                    to_id: to.id,
                    to_name: to.name.clone(),
                    rel_type: hop.rel_type,
                    properties: hop.properties,
                    consistency: None,
                }
            })
            .collect();
        Path::new(self.nodes, relationships)
    }
}

// ============================================================================
// Sessions
// ============================================================================

/// A short-lived, read-only conversation with the store.
///
/// Sessions are released when dropped, so release happens on every exit
/// path of the code that acquired one.
pub trait Session: Send + Sync {
    fn id(&self) -> u64;
}

// ============================================================================
// Search
// ============================================================================

/// Text properties searched alongside the node name.
pub const SEARCHABLE_PROPERTIES: [&str; 2] = ["症状描述", "注意事项"];

/// Whether `node` matches an already lowercased search needle.
fn search_hit(node: &Node, needle: &str) -> bool {
    let contains = |text: &str| text.to_lowercase().contains(needle);
    contains(&node.name)
        || SEARCHABLE_PROPERTIES
            .iter()
            .filter_map(|key| node.properties.get(*key))
            .any(|value| contains(&value.to_string()))
}

// ============================================================================
// GraphStore Trait
// ============================================================================

/// The read-only store contract.
///
/// Text arguments (`fragment`, `start`, `end`) and id lists are always
/// passed as bound parameters by implementations that build query text.
#[async_trait]
pub trait GraphStore: Send + Sync + 'static {
    /// The session type for this store.
    type Session: Session;

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Probe the store. Failure here is fatal at startup.
    async fn verify_connectivity(&self) -> Result<()>;

    /// Acquire a session for one logical query.
    async fn begin_session(&self) -> Result<Self::Session>;

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Distinct display names of every node.
    async fn node_names(&self, session: &Self::Session) -> Result<Vec<String>>;

    /// Nodes whose name contains `fragment`, at most `limit`.
    async fn find_nodes(
        &self,
        session: &Self::Session,
        fragment: &str,
        limit: usize,
    ) -> Result<Vec<Node>>;

    /// Nodes whose name or [`SEARCHABLE_PROPERTIES`] contain `query`,
    /// ignoring case, ordered by id, at most `limit`.
    ///
    /// Default: filters `all_nodes`.
    async fn search_nodes(
        &self,
        session: &Self::Session,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Node>> {
        let needle = query.to_lowercase();
        Ok(self
            .all_nodes(session)
            .await?
            .into_iter()
            .filter(|node| search_hit(node, &needle))
            .take(limit)
            .collect())
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// All undirected paths of length `1..=depth` starting at any seed,
    /// ordered by ascending length and truncated to `limit`.
    async fn paths_from(
        &self,
        session: &Self::Session,
        seeds: &[NodeId],
        depth: HopBound,
        limit: usize,
    ) -> Result<Vec<TraversalPath>>;

    /// Undirected paths of length `1..=hops` whose start node name contains
    /// `start` and whose end node name contains `end`, ascending by length,
    /// truncated to `limit`.
    async fn paths_between(
        &self,
        session: &Self::Session,
        start: &str,
        end: &str,
        hops: HopBound,
        limit: usize,
    ) -> Result<Vec<TraversalPath>>;

    // ========================================================================
    // Scan (export)
    // ========================================================================

    /// Every node, ordered by id.
    async fn all_nodes(&self, session: &Self::Session) -> Result<Vec<Node>>;

    /// Every relationship, directed as stored.
    async fn all_relationships(&self, session: &Self::Session) -> Result<Vec<Relationship>>;

    /// Total number of nodes.
    ///
    /// Default: counts `all_nodes`.
    async fn node_count(&self, session: &Self::Session) -> Result<u64> {
        Ok(self.all_nodes(session).await?.len() as u64)
    }

    /// Total number of relationships.
    ///
    /// Default: counts `all_relationships`.
    async fn relationship_count(&self, session: &Self::Session) -> Result<u64> {
        Ok(self.all_relationships(session).await?.len() as u64)
    }
}
