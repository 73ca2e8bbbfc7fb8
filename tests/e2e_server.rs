//! HTTP routes exercised in-process with `tower::ServiceExt::oneshot`.

#![cfg(feature = "server")]

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::{json, Value as Json};
use tower::ServiceExt;

use common::*;
use kg_rag::export::ExportOptions;
use kg_rag::generator::Unconfigured;
use kg_rag::server::{router, AppState};
use kg_rag::{Pipeline, RetrievalSettings};

fn app() -> Router {
    let pipeline = Pipeline::new(cardiology_store(), Unconfigured, RetrievalSettings::default()).unwrap();
    router(AppState::new(pipeline, ExportOptions::default()))
}

fn broken_app() -> Router {
    let pipeline = Pipeline::new(BrokenStore, Unconfigured, RetrievalSettings::default()).unwrap();
    router(AppState::new(pipeline, ExportOptions::default()))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Json) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn post_json(uri: &str, body: Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

// ============================================================================
// Answers
// ============================================================================

#[tokio::test]
async fn test_answer_questions_returns_text_and_timestamp() {
    let (status, body) = send(app(), post_json("/api/answer_questions", json!({ "message": "急性心肌梗死怎么治疗" }))).await;

    assert_eq!(status, StatusCode::OK);
    let response = body["response"].as_str().unwrap();
    assert!(response.contains("急性心肌梗死"), "unexpected answer: {response}");
    assert!(body["timestamp"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn test_blank_message_is_a_bad_request() {
    for payload in [json!({ "message": "   " }), json!({})] {
        let (status, body) = send(app(), post_json("/api/answer_questions", payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().is_some());
    }
}

#[tokio::test]
async fn test_malformed_json_is_rejected_with_error_body() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/answer_questions")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = send(app(), request).await;

    assert!(status.is_client_error());
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn test_detail_carries_sources_and_reasoning() {
    let (status, body) = send(
        app(),
        post_json("/api/answer_questions/detail", json!({ "message": "急性心肌梗死和阿司匹林" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["answer"].as_str().is_some());
    assert!(body["confidence"].as_f64().is_some_and(|c| (0.0..=100.0).contains(&c)));
    assert!(body["knowledge_source"]["entity_count"].as_u64().unwrap() > 0);
    assert!(body["knowledge_source"]["relevant_entities"].as_array().unwrap().len() <= 10);
    assert_eq!(body["reasoning"]["has_reasoning"], json!(true));
    assert_eq!(body["metadata"]["query"], json!("急性心肌梗死和阿司匹林"));
    assert!(body["timestamp"].is_string());
}

// ============================================================================
// Graph export
// ============================================================================

#[tokio::test]
async fn test_get_kg_exports_groups_and_weights() {
    let (status, body) = send(app(), get("/api/get_kg")).await;

    assert_eq!(status, StatusCode::OK);
    let nodes = body["nodes"].as_array().unwrap();
    let links = body["links"].as_array().unwrap();
    assert_eq!(nodes.len(), 7);
    assert_eq!(links.len(), 7);

    let mi = nodes.iter().find(|n| n["label"] == json!("急性心肌梗死")).unwrap();
    assert_eq!(mi["group"], json!("disease"));
    assert_eq!(mi["type"], json!("疾病"));

    let treatment = links.iter().find(|l| l["relationship_type"] == json!("需要治疗")).unwrap();
    assert_eq!(treatment["value"], json!(3));
}

#[tokio::test]
async fn test_search_nodes_matches_fragment() {
    // 心
    let (status, body) = send(app(), get("/api/search_nodes?query=%E5%BF%83")).await;

    assert_eq!(status, StatusCode::OK);
    let labels: Vec<&str> = body.as_array().unwrap().iter().map(|n| n["label"].as_str().unwrap()).collect();
    assert_eq!(labels, vec!["急性心肌梗死", "心电图", "心率", "心源性休克"]);
}

#[tokio::test]
async fn test_empty_search_returns_nothing() {
    let (status, body) = send(app(), get("/api/search_nodes")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_reports_store_status() {
    let (status, body) = send(app(), get("/api/test_connection")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("healthy"));
    assert_eq!(body["database_status"]["status"], json!("connected"));

    let (status, body) = send(broken_app(), get("/api/test_connection")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database_status"]["status"], json!("error"));
}

#[tokio::test]
async fn test_store_status_is_unavailable_when_check_fails() {
    let (status, body) = send(app(), get("/api/store/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("connected"));

    let (status, body) = send(broken_app(), get("/api/store/status")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], json!("error"));
}

#[tokio::test]
async fn test_export_failure_is_a_server_error() {
    let (status, body) = send(broken_app(), get("/api/get_kg")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("query failed"));
}
