//! # kg-rag: Subgraph-Grounded Question Answering
//!
//! Answers natural-language questions from a labeled property graph. The
//! answer is generated only from a retrieved subgraph, and the crate reports
//! how well it stayed inside that subgraph.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `GraphStore` is the contract between the pipeline and storage;
//!    `Generator` is the contract with the text-generation service
//! 2. **Clean DTOs**: `Node`, `Relationship`, `Path`, `Subgraph` cross all boundaries
//! 3. **Injected collaborators**: the pipeline owns its store and generator, no globals
//! 4. **Degrade, don't fail**: store and generator failures inside a request fall
//!    back to deterministic behavior
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kg_rag::{MemoryStore, Pipeline, PipelineOptions, PropertyMap, RetrievalSettings};
//! use kg_rag::generator::Unconfigured;
//!
//! # async fn example() -> kg_rag::Result<()> {
//! let store = MemoryStore::new();
//! let flu = store.create_node("Disease", "influenza", PropertyMap::new());
//! let rest = store.create_node("Treatment", "bed rest", PropertyMap::new());
//! store.create_relationship(flu, rest, "TREATED_BY", PropertyMap::new())?;
//!
//! let pipeline = Pipeline::connect(store, Unconfigured, RetrievalSettings::default()).await?;
//! let outcome = pipeline.answer("how is influenza treated?", PipelineOptions::default()).await?;
//! println!("{}", outcome.answer);
//! # Ok(())
//! # }
//! ```
//!
//! ## Stores
//!
//! | Store | Description |
//! |-------|-------------|
//! | `MemoryStore` | In-process graph for testing/embedding, loadable from a JSON fixture |
//! | `Neo4jHttpStore` | Neo4j via the HTTP transactional Cypher endpoint |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod storage;
pub mod generator;
pub mod matching;
pub mod pipeline;
pub mod report;
pub mod export;
pub mod config;
pub mod logging;

#[cfg(feature = "server")]
pub mod server;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{Node, NodeId, Relationship, Path, Subgraph, Value, PropertyMap};

// ============================================================================
// Re-exports: Storage
// ============================================================================

pub use storage::{GraphStore, Session, HopBound, MemoryStore, Neo4jHttpStore};

// ============================================================================
// Re-exports: Generation
// ============================================================================

pub use generator::{Generator, GenerationRequest, GeneratorError};

// ============================================================================
// Re-exports: Pipeline
// ============================================================================

pub use pipeline::{
    Pipeline, PipelineOptions, RetrievalSettings, EntityScope, MatcherKind,
    GroundedAnswer, ConsistentRetrieval, ReasoningChain, ReasoningOutcome,
    ValidationResult, ClaimCheck,
};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
