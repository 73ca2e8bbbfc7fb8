use std::fs::File;
use std::path::PathBuf;

use kg_rag::config::{self, Config, StoreBackend};
use kg_rag::generator::{Generator, OpenAiCompatible, Unconfigured};
use kg_rag::server::{self, AppState};
use kg_rag::storage::neo4j_http::Neo4jHttpStore;
use kg_rag::{logging, Error, GraphStore, MemoryStore, Pipeline, Result};
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // .env is optional.
    let _ = dotenvy::dotenv();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = config::load(config_path.as_deref())?;
    logging::init(&config.log_level)?;

    info!(
        backend = ?config.store.backend,
        bind = %config.server.bind,
        log_level = %config.log_level,
        "config loaded"
    );

    let generator = build_generator(&config)?;
    match config.store.backend {
        StoreBackend::Neo4j => {
            let store = Neo4jHttpStore::new(&config.neo4j())?;
            start(store, generator, config).await
        }
        StoreBackend::Memory => {
            let path = config
                .store
                .fixture
                .clone()
                .ok_or_else(|| Error::Config("store.fixture is required for the memory backend".into()))?;
            let store = MemoryStore::load_fixture(File::open(&path)?)?;
            info!(fixture = %path.display(), "memory store loaded");
            start(store, generator, config).await
        }
    }
}

fn build_generator(config: &Config) -> Result<Box<dyn Generator>> {
    match config.openai() {
        Some(openai) => {
            info!(model = %openai.model, "text generation enabled");
            Ok(Box::new(OpenAiCompatible::new(openai)?))
        }
        None => {
            warn!("LLM_API_KEY not set, answers use the templated fallback");
            Ok(Box::new(Unconfigured))
        }
    }
}

async fn start<S: GraphStore>(store: S, generator: Box<dyn Generator>, config: Config) -> Result<()> {
    let pipeline = Pipeline::connect(store, generator, config.retrieval.clone()).await?;
    let state = AppState::new(pipeline, config.export.clone());
    server::serve(state, &config.server.bind, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
