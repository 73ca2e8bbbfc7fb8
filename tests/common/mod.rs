//! Shared doubles and fixtures for the end-to-end suites.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use kg_rag::generator::{GenerationRequest, Generator, GeneratorError};
use kg_rag::model::{Node, NodeId, Relationship};
use kg_rag::storage::memory::MemorySession;
use kg_rag::storage::{GraphStore, HopBound, TraversalPath};
use kg_rag::{Error, MemoryStore, PropertyMap, Result};

/// Prefix of the entity extraction prompt.
pub const EXTRACTION_PROMPT: &str = "Extract the key entity names";

// ============================================================================
// Generators
// ============================================================================

/// Replays scripted replies. Extraction prompts consume `extraction` in
/// order; every other prompt gets `answer`. An exhausted script or an
/// unset answer fails as unconfigured.
#[derive(Default)]
pub struct ScriptedGenerator {
    extraction: Mutex<VecDeque<std::result::Result<String, GeneratorError>>>,
    answer: Mutex<Option<String>>,
    pub prompts: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extract(self, reply: &str) -> Self {
        self.extraction.lock().push_back(Ok(reply.to_string()));
        self
    }

    pub fn extract_err(self, err: GeneratorError) -> Self {
        self.extraction.lock().push_back(Err(err));
        self
    }

    pub fn answer(self, reply: &str) -> Self {
        *self.answer.lock() = Some(reply.to_string());
        self
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> std::result::Result<String, GeneratorError> {
        self.prompts.lock().push(request.clone());
        if request.prompt.starts_with(EXTRACTION_PROMPT) {
            self.extraction.lock().pop_front().unwrap_or(Err(GeneratorError::Unconfigured))
        } else {
            self.answer.lock().clone().ok_or(GeneratorError::Unconfigured)
        }
    }
}

/// Fails every call with the given error.
pub struct FailingGenerator(pub GeneratorError);

#[async_trait]
impl Generator for FailingGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> std::result::Result<String, GeneratorError> {
        Err(self.0.clone())
    }
}

// ============================================================================
// Stores
// ============================================================================

/// A [`MemoryStore`] that counts traversal requests.
#[derive(Clone, Default)]
pub struct RecordingStore {
    pub inner: MemoryStore,
    pub expansions: Arc<AtomicUsize>,
}

impl RecordingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self { inner, expansions: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn expansions(&self) -> usize {
        self.expansions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphStore for RecordingStore {
    type Session = MemorySession;

    async fn verify_connectivity(&self) -> Result<()> {
        self.inner.verify_connectivity().await
    }

    async fn begin_session(&self) -> Result<MemorySession> {
        self.inner.begin_session().await
    }

    async fn node_names(&self, session: &MemorySession) -> Result<Vec<String>> {
        self.inner.node_names(session).await
    }

    async fn find_nodes(&self, session: &MemorySession, fragment: &str, limit: usize) -> Result<Vec<Node>> {
        self.inner.find_nodes(session, fragment, limit).await
    }

    async fn paths_from(
        &self,
        session: &MemorySession,
        seeds: &[NodeId],
        depth: HopBound,
        limit: usize,
    ) -> Result<Vec<TraversalPath>> {
        self.expansions.fetch_add(1, Ordering::SeqCst);
        self.inner.paths_from(session, seeds, depth, limit).await
    }

    async fn paths_between(
        &self,
        session: &MemorySession,
        start: &str,
        end: &str,
        hops: HopBound,
        limit: usize,
    ) -> Result<Vec<TraversalPath>> {
        self.inner.paths_between(session, start, end, hops, limit).await
    }

    async fn all_nodes(&self, session: &MemorySession) -> Result<Vec<Node>> {
        self.inner.all_nodes(session).await
    }

    async fn all_relationships(&self, session: &MemorySession) -> Result<Vec<Relationship>> {
        self.inner.all_relationships(session).await
    }
}

pub struct BrokenSession;

impl kg_rag::Session for BrokenSession {
    fn id(&self) -> u64 {
        0
    }
}

/// Accepts sessions but fails every query.
pub struct BrokenStore;

fn broken<T>() -> Result<T> {
    Err(Error::Store("query failed".into()))
}

#[async_trait]
impl GraphStore for BrokenStore {
    type Session = BrokenSession;

    async fn verify_connectivity(&self) -> Result<()> {
        Err(Error::Store("connection refused".into()))
    }

    async fn begin_session(&self) -> Result<BrokenSession> {
        Ok(BrokenSession)
    }

    async fn node_names(&self, _: &BrokenSession) -> Result<Vec<String>> {
        broken()
    }

    async fn find_nodes(&self, _: &BrokenSession, _: &str, _: usize) -> Result<Vec<Node>> {
        broken()
    }

    async fn paths_from(&self, _: &BrokenSession, _: &[NodeId], _: HopBound, _: usize) -> Result<Vec<TraversalPath>> {
        broken()
    }

    async fn paths_between(
        &self,
        _: &BrokenSession,
        _: &str,
        _: &str,
        _: HopBound,
        _: usize,
    ) -> Result<Vec<TraversalPath>> {
        broken()
    }

    async fn all_nodes(&self, _: &BrokenSession) -> Result<Vec<Node>> {
        broken()
    }

    async fn all_relationships(&self, _: &BrokenSession) -> Result<Vec<Relationship>> {
        broken()
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// `A -[R]-> B`, ids 1 and 2.
pub fn pair_store() -> MemoryStore {
    let store = MemoryStore::new();
    let a = store.create_node("Entity", "A", PropertyMap::new());
    let b = store.create_node("Entity", "B", PropertyMap::new());
    store.create_relationship(a, b, "R", PropertyMap::new()).unwrap();
    store
}

/// Small cardiology graph from `fixtures/cardiology.json`.
pub fn cardiology_store() -> MemoryStore {
    let json = include_str!("../../fixtures/cardiology.json");
    MemoryStore::load_fixture(json.as_bytes()).unwrap()
}
