//! HTTP surface (feature `server`).
//!
//! | Method & path | Handler |
//! |---------------|---------|
//! | `POST /api/answer_questions` | answer text plus timestamp |
//! | `POST /api/answer_questions/detail` | shaped [`UserResponse`] plus timestamp |
//! | `GET /api/test_connection` | service health |
//! | `GET /api/store/status` | store connectivity check |
//! | `GET /api/get_kg` | whole-graph export |
//! | `GET /api/search_nodes?query=` | node search |
//!
//! Errors are `{"error": "..."}` with a 4xx/5xx status.

use std::future::Future;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::export::{self, ExportNode, ExportOptions, GraphExport};
use crate::generator::Generator;
use crate::pipeline::{GroundedAnswer, Pipeline, PipelineOptions};
use crate::report::UserResponse;
use crate::storage::GraphStore;
use crate::{Error, Result};

// ============================================================================
// State and errors
// ============================================================================

pub struct AppState<S, G> {
    pub pipeline: Pipeline<S, G>,
    pub export: Arc<ExportOptions>,
}

impl<S, G> Clone for AppState<S, G> {
    fn clone(&self) -> Self {
        Self { pipeline: self.pipeline.clone(), export: Arc::clone(&self.export) }
    }
}

impl<S: GraphStore, G: Generator> AppState<S, G> {
    pub fn new(pipeline: Pipeline<S, G>, export: ExportOptions) -> Self {
        Self { pipeline, export: Arc::new(export) }
    }
}

/// A failed request: status plus message, rendered as `{"error": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        let status = match e {
            Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Error::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %e, "request failed");
        }
        Self { status, message: e.to_string() }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self { status: rejection.status(), message: rejection.body_text() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct DetailResponse {
    #[serde(flatten)]
    pub response: UserResponse,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct StoreStatus {
    pub status: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: String,
    pub database_status: StoreStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

// ============================================================================
// Router
// ============================================================================

pub fn router<S: GraphStore, G: Generator>(state: AppState<S, G>) -> Router {
    Router::new()
        .route("/api/answer_questions", post(answer_questions::<S, G>))
        .route("/api/answer_questions/detail", post(answer_questions_detail::<S, G>))
        .route("/api/test_connection", get(test_connection::<S, G>))
        .route("/api/store/status", get(store_status::<S, G>))
        .route("/api/get_kg", get(get_kg::<S, G>))
        .route("/api/search_nodes", get(search_nodes::<S, G>))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve<S: GraphStore, G: Generator>(
    state: AppState<S, G>,
    bind: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(%bind, "HTTP server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("HTTP server shutdown complete");
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

async fn run_pipeline<S: GraphStore, G: Generator>(
    state: &AppState<S, G>,
    body: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> std::result::Result<GroundedAnswer, ApiError> {
    let Json(request) = body?;
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }
    Ok(state.pipeline.answer(message, PipelineOptions::default()).await?)
}

async fn answer_questions<S: GraphStore, G: Generator>(
    State(state): State<AppState<S, G>>,
    body: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<ChatResponse> {
    let outcome = run_pipeline(&state, body).await?;
    Ok(Json(ChatResponse { response: outcome.answer, timestamp: timestamp() }))
}

async fn answer_questions_detail<S: GraphStore, G: Generator>(
    State(state): State<AppState<S, G>>,
    body: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<DetailResponse> {
    let outcome = run_pipeline(&state, body).await?;
    Ok(Json(DetailResponse { response: UserResponse::from_outcome(&outcome), timestamp: timestamp() }))
}

async fn check_store<S: GraphStore>(store: &S) -> StoreStatus {
    match store.verify_connectivity().await {
        Ok(()) => StoreStatus { status: "connected", message: "graph store reachable".into() },
        Err(e) => StoreStatus { status: "error", message: e.to_string() },
    }
}

async fn test_connection<S: GraphStore, G: Generator>(
    State(state): State<AppState<S, G>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        message: "service is running".into(),
        database_status: check_store(state.pipeline.store()).await,
    })
}

async fn store_status<S: GraphStore, G: Generator>(
    State(state): State<AppState<S, G>>,
) -> (StatusCode, Json<StoreStatus>) {
    let status = check_store(state.pipeline.store()).await;
    let code = if status.status == "connected" { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, Json(status))
}

async fn get_kg<S: GraphStore, G: Generator>(State(state): State<AppState<S, G>>) -> ApiResult<GraphExport> {
    Ok(Json(export::export_graph(state.pipeline.store(), &state.export).await?))
}

async fn search_nodes<S: GraphStore, G: Generator>(
    State(state): State<AppState<S, G>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Vec<ExportNode>> {
    Ok(Json(export::search_nodes(state.pipeline.store(), &params.query, &state.export).await?))
}
