//! Neo4j HTTP store against a mocked transactional endpoint.

use pretty_assertions::assert_eq;
use serde_json::{json, Value as Json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kg_rag::model::NodeId;
use kg_rag::storage::neo4j_http::{Neo4jConfig, Neo4jHttpStore};
use kg_rag::{Error, GraphStore, HopBound, Value};

const COMMIT: &str = "/db/neo4j/tx/commit";

fn config(uri: &str) -> Neo4jConfig {
    Neo4jConfig {
        uri: uri.to_string(),
        database: "neo4j".to_string(),
        username: "neo4j".to_string(),
        password: Some("secret".to_string()),
        timeout_seconds: 5,
    }
}

fn rows(columns: &[&str], data: Vec<Json>) -> Json {
    json!({
        "results": [{
            "columns": columns,
            "data": data.into_iter().map(|row| json!({ "row": row })).collect::<Vec<_>>(),
        }],
        "errors": [],
    })
}

async fn mount(server: &MockServer, body: Json) {
    Mock::given(method("POST"))
        .and(path(COMMIT))
        .and(header("authorization", "Basic bmVvNGo6c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Statement and parameters of the single request received.
async fn sent_statement(server: &MockServer) -> (String, Json) {
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: Json = serde_json::from_slice(&requests[0].body).unwrap();
    let statement = &body["statements"][0];
    (statement["statement"].as_str().unwrap().to_string(), statement["parameters"].clone())
}

fn node_json(id: u64, label: &str, name: &str) -> Json {
    json!({ "id": id, "type": label, "name": name, "properties": { "name": name } })
}

// ============================================================================
// Lookup
// ============================================================================

#[tokio::test]
async fn test_find_nodes_binds_fragment_as_parameter() {
    let server = MockServer::start().await;
    mount(&server, rows(&["node"], vec![json!([node_json(7, "疾病", "心力衰竭")])])).await;
    let store = Neo4jHttpStore::new(&config(&server.uri())).unwrap();
    let session = store.begin_session().await.unwrap();

    let nodes = store.find_nodes(&session, "心力' OR 1=1 //", 5).await.unwrap();

    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].id, NodeId(7));
    assert_eq!(nodes[0].label, "疾病");
    assert_eq!(nodes[0].name, "心力衰竭");

    let (statement, parameters) = sent_statement(&server).await;
    assert!(statement.contains("CONTAINS $fragment"));
    assert!(!statement.contains("OR 1=1"));
    assert_eq!(parameters, json!({ "fragment": "心力' OR 1=1 //", "limit": 5 }));
}

#[tokio::test]
async fn test_search_nodes_lowercases_name_and_notes() {
    let server = MockServer::start().await;
    mount(&server, rows(&["node"], vec![json!([node_json(3, "药物", "Aspirin")])])).await;
    let store = Neo4jHttpStore::new(&config(&server.uri())).unwrap();
    let session = store.begin_session().await.unwrap();

    let nodes = store.search_nodes(&session, "ASPIRIN", 20).await.unwrap();

    assert_eq!(nodes[0].name, "Aspirin");
    let (statement, parameters) = sent_statement(&server).await;
    assert!(statement.contains("toLower(node.name) CONTAINS toLower($query)"));
    assert!(statement.contains("toLower(node.注意事项)"));
    assert_eq!(parameters, json!({ "query": "ASPIRIN", "limit": 20 }));
}

#[tokio::test]
async fn test_node_names_reads_the_name_column() {
    let server = MockServer::start().await;
    mount(&server, rows(&["name"], vec![json!(["A"]), json!(["B"])])).await;
    let store = Neo4jHttpStore::new(&config(&server.uri())).unwrap();
    let session = store.begin_session().await.unwrap();

    assert_eq!(store.node_names(&session).await.unwrap(), vec!["A".to_string(), "B".to_string()]);
}

// ============================================================================
// Traversal
// ============================================================================

#[tokio::test]
async fn test_paths_from_interpolates_only_the_hop_bound() {
    let server = MockServer::start().await;
    let row = json!([
        [node_json(1, "疾病", "A"), node_json(2, "药物", "B")],
        [{ "type": "使用药物", "properties": { "剂量": "10mg" } }],
        1
    ]);
    mount(&server, rows(&["nodes", "relationships", "path_length"], vec![row])).await;
    let store = Neo4jHttpStore::new(&config(&server.uri())).unwrap();
    let session = store.begin_session().await.unwrap();

    let paths = store
        .paths_from(&session, &[NodeId(1), NodeId(9)], HopBound::new(2).unwrap(), 10)
        .await
        .unwrap();

    assert_eq!(paths.len(), 1);
    let path = paths.into_iter().next().unwrap().into_path().unwrap();
    assert_eq!(path.description, "A[使用药物]->B");
    assert_eq!(path.relationships[0].properties.get("剂量"), Some(&Value::from("10mg")));

    let (statement, parameters) = sent_statement(&server).await;
    assert!(statement.contains("[*1..2]"));
    assert!(statement.contains("id(start) IN $node_ids"));
    assert_eq!(parameters, json!({ "node_ids": [1, 9], "limit": 10 }));
}

#[tokio::test]
async fn test_paths_between_binds_endpoints() {
    let server = MockServer::start().await;
    mount(&server, rows(&["nodes", "relationships", "hops"], vec![])).await;
    let store = Neo4jHttpStore::new(&config(&server.uri())).unwrap();
    let session = store.begin_session().await.unwrap();

    let paths = store
        .paths_between(&session, "A", "C", HopBound::new(3).unwrap(), 10)
        .await
        .unwrap();

    assert!(paths.is_empty());
    let (statement, parameters) = sent_statement(&server).await;
    assert!(statement.contains("[*1..3]"));
    assert_eq!(parameters, json!({ "start": "A", "end": "C", "limit": 10 }));
}

// ============================================================================
// Scan
// ============================================================================

#[tokio::test]
async fn test_all_relationships_decode() {
    let server = MockServer::start().await;
    let row = json!([1, "A", 2, "B", "需要治疗", { "时机": "立即" }]);
    mount(
        &server,
        rows(&["from_id", "from_name", "to_id", "to_name", "type", "properties"], vec![row]),
    )
    .await;
    let store = Neo4jHttpStore::new(&config(&server.uri())).unwrap();
    let session = store.begin_session().await.unwrap();

    let rels = store.all_relationships(&session).await.unwrap();

    assert_eq!(rels.len(), 1);
    assert_eq!(rels[0].triple(), "A → 需要治疗 → B");
}

#[tokio::test]
async fn test_node_count_reads_scalar() {
    let server = MockServer::start().await;
    mount(&server, rows(&["count"], vec![json!([42])])).await;
    let store = Neo4jHttpStore::new(&config(&server.uri())).unwrap();
    let session = store.begin_session().await.unwrap();

    assert_eq!(store.node_count(&session).await.unwrap(), 42);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_cypher_errors_surface_as_store_errors() {
    let server = MockServer::start().await;
    let body = json!({
        "results": [],
        "errors": [{ "code": "Neo.ClientError.Statement.SyntaxError", "message": "bad" }],
    });
    mount(&server, body).await;
    let store = Neo4jHttpStore::new(&config(&server.uri())).unwrap();
    let session = store.begin_session().await.unwrap();

    let err = store.node_names(&session).await.unwrap_err();
    assert!(matches!(err, Error::Store(msg) if msg.contains("SyntaxError")));
}

#[tokio::test]
async fn test_missing_column_is_a_decode_error() {
    let server = MockServer::start().await;
    mount(&server, rows(&["other"], vec![json!(["x"])])).await;
    let store = Neo4jHttpStore::new(&config(&server.uri())).unwrap();
    let session = store.begin_session().await.unwrap();

    assert!(matches!(store.node_names(&session).await, Err(Error::Decode(_))));
}

#[tokio::test]
async fn test_unauthorized_connectivity_check_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMMIT))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;
    let store = Neo4jHttpStore::new(&config(&server.uri())).unwrap();

    assert!(matches!(store.verify_connectivity().await, Err(Error::StoreUnavailable(_))));
}

#[tokio::test]
async fn test_reachable_store_connects() {
    let server = MockServer::start().await;
    mount(&server, rows(&["ok"], vec![json!([1])])).await;
    let store = Neo4jHttpStore::new(&config(&format!("{}/", server.uri()))).unwrap();

    store.verify_connectivity().await.unwrap();
}
