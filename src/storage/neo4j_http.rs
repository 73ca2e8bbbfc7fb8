//! Neo4j store over the HTTP transactional Cypher endpoint.
//!
//! Every call is a single auto-commit request to
//! `POST {uri}/db/{database}/tx/commit`. Text and id arguments travel as
//! bound `parameters`; the only value formatted into statement text is a
//! [`HopBound`], because variable-length patterns cannot be parameterized.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, trace, warn};

use crate::model::*;
use crate::{Error, Result};
use super::{GraphStore, Hop, HopBound, Session, TraversalPath};

const NODE_PROJECTION: &str =
    "{id: id(node), type: labels(node)[0], name: node.name, properties: properties(node)}";

/// Connection settings for [`Neo4jHttpStore`].
#[derive(Debug, Clone)]
pub struct Neo4jConfig {
    /// HTTP base URI, e.g. `http://localhost:7474`.
    pub uri: String,
    pub database: String,
    pub username: String,
    /// Never read from configuration files.
    pub password: Option<String>,
    pub timeout_seconds: u64,
}

/// Graph store backed by a Neo4j server.
pub struct Neo4jHttpStore {
    client: Client,
    endpoint: String,
    username: String,
    password: Option<String>,
    next_session_id: AtomicU64,
}

impl Neo4jHttpStore {
    pub fn new(config: &Neo4jConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        let endpoint = format!(
            "{}/db/{}/tx/commit",
            config.uri.trim_end_matches('/'),
            config.database
        );
        Ok(Self {
            client,
            endpoint,
            username: config.username.clone(),
            password: config.password.clone(),
            next_session_id: AtomicU64::new(1),
        })
    }

    /// Run one statement and return its rows keyed by column name.
    async fn run(&self, statement: &str, parameters: serde_json::Value) -> Result<Vec<Row>> {
        trace!(%statement, %parameters, "cypher statement");
        let body = json!({
            "statements": [{ "statement": statement, "parameters": parameters }]
        });

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.username, self.password.as_deref())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Store(format!("request to {} failed: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Store(format!("HTTP {status}: {text}")));
        }

        let envelope: CommitResponse = response
            .json()
            .await
            .map_err(|e| Error::Decode(format!("unreadable commit response: {e}")))?;

        if let Some(err) = envelope.errors.first() {
            return Err(Error::Store(format!("{}: {}", err.code, err.message)));
        }

        let Some(result) = envelope.results.into_iter().next() else {
            return Ok(Vec::new());
        };
        let rows = result
            .data
            .into_iter()
            .map(|record| {
                result
                    .columns
                    .iter()
                    .cloned()
                    .zip(record.row)
                    .collect::<Row>()
            })
            .collect::<Vec<_>>();
        debug!(rows = rows.len(), "cypher statement completed");
        Ok(rows)
    }
}

type Row = serde_json::Map<String, serde_json::Value>;

fn column<T: serde::de::DeserializeOwned>(row: &mut Row, name: &str) -> Result<T> {
    let value = row
        .remove(name)
        .ok_or_else(|| Error::Decode(format!("missing column '{name}'")))?;
    serde_json::from_value(value).map_err(|e| Error::Decode(format!("column '{name}': {e}")))
}

fn decode_traversal(mut row: Row) -> Result<TraversalPath> {
    let nodes: Vec<WireNode> = column(&mut row, "nodes")?;
    let hops: Vec<Hop> = column(&mut row, "relationships")?;
    Ok(TraversalPath {
        nodes: nodes.into_iter().map(Node::from).collect(),
        hops,
    })
}

// ============================================================================
// Neo4jSession
// ============================================================================

/// HTTP auto-commit requests carry no server-side state; the session only
/// scopes one logical conversation for tracing.
pub struct Neo4jSession {
    id: u64,
}

impl Session for Neo4jSession {
    fn id(&self) -> u64 { self.id }
}

impl Drop for Neo4jSession {
    fn drop(&mut self) {
        trace!(session = self.id, "neo4j session released");
    }
}

// ============================================================================
// GraphStore impl
// ============================================================================

#[async_trait]
impl GraphStore for Neo4jHttpStore {
    type Session = Neo4jSession;

    async fn verify_connectivity(&self) -> Result<()> {
        self.run("RETURN 1 AS ok", json!({}))
            .await
            .map(|_| ())
            .map_err(|e| {
                warn!(error = %e, "neo4j connectivity check failed");
                Error::StoreUnavailable(e.to_string())
            })
    }

    async fn begin_session(&self) -> Result<Neo4jSession> {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        trace!(session = id, "neo4j session opened");
        Ok(Neo4jSession { id })
    }

    async fn node_names(&self, _session: &Neo4jSession) -> Result<Vec<String>> {
        let rows = self
            .run(
                "MATCH (n) WHERE n.name IS NOT NULL RETURN DISTINCT n.name AS name",
                json!({}),
            )
            .await?;
        rows.into_iter().map(|mut row| column(&mut row, "name")).collect()
    }

    async fn find_nodes(
        &self,
        _session: &Neo4jSession,
        fragment: &str,
        limit: usize,
    ) -> Result<Vec<Node>> {
        let statement = format!(
            "MATCH (node) WHERE node.name CONTAINS $fragment \
             RETURN {NODE_PROJECTION} AS node LIMIT $limit"
        );
        let rows = self.run(&statement, json!({ "fragment": fragment, "limit": limit })).await?;
        rows.into_iter()
            .map(|mut row| column::<WireNode>(&mut row, "node").map(Node::from))
            .collect()
    }

    async fn search_nodes(
        &self,
        _session: &Neo4jSession,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Node>> {
        let statement = format!(
            "MATCH (node) \
             WHERE toLower(node.name) CONTAINS toLower($query) \
                OR toLower(node.症状描述) CONTAINS toLower($query) \
                OR toLower(node.注意事项) CONTAINS toLower($query) \
             RETURN {NODE_PROJECTION} AS node ORDER BY id(node) LIMIT $limit"
        );
        let rows = self.run(&statement, json!({ "query": query, "limit": limit })).await?;
        rows.into_iter()
            .map(|mut row| column::<WireNode>(&mut row, "node").map(Node::from))
            .collect()
    }

    async fn paths_from(
        &self,
        _session: &Neo4jSession,
        seeds: &[NodeId],
        depth: HopBound,
        limit: usize,
    ) -> Result<Vec<TraversalPath>> {
        let statement = format!(
            "MATCH path = (start)-[*1..{depth}]-(end) \
             WHERE id(start) IN $node_ids \
             RETURN [node IN nodes(path) | {NODE_PROJECTION}] AS nodes, \
                    [rel IN relationships(path) | {{type: type(rel), properties: properties(rel)}}] AS relationships, \
                    length(path) AS path_length \
             ORDER BY path_length ASC \
             LIMIT $limit"
        );
        let ids: Vec<u64> = seeds.iter().map(|id| id.0).collect();
        let rows = self.run(&statement, json!({ "node_ids": ids, "limit": limit })).await?;
        rows.into_iter().map(decode_traversal).collect()
    }

    async fn paths_between(
        &self,
        _session: &Neo4jSession,
        start: &str,
        end: &str,
        hops: HopBound,
        limit: usize,
    ) -> Result<Vec<TraversalPath>> {
        let statement = format!(
            "MATCH path = (start)-[*1..{hops}]-(end) \
             WHERE start.name CONTAINS $start AND end.name CONTAINS $end \
             RETURN [node IN nodes(path) | {NODE_PROJECTION}] AS nodes, \
                    [rel IN relationships(path) | {{type: type(rel), properties: properties(rel)}}] AS relationships, \
                    length(path) AS hops \
             ORDER BY hops ASC \
             LIMIT $limit"
        );
        let rows = self
            .run(&statement, json!({ "start": start, "end": end, "limit": limit }))
            .await?;
        rows.into_iter().map(decode_traversal).collect()
    }

    async fn all_nodes(&self, _session: &Neo4jSession) -> Result<Vec<Node>> {
        let statement = format!("MATCH (node) RETURN {NODE_PROJECTION} AS node ORDER BY id(node)");
        let rows = self.run(&statement, json!({})).await?;
        rows.into_iter()
            .map(|mut row| column::<WireNode>(&mut row, "node").map(Node::from))
            .collect()
    }

    async fn all_relationships(&self, _session: &Neo4jSession) -> Result<Vec<Relationship>> {
        let rows = self
            .run(
                "MATCH (a)-[r]->(b) \
                 RETURN id(a) AS from_id, a.name AS from_name, id(b) AS to_id, b.name AS to_name, \
                        type(r) AS type, properties(r) AS properties \
                 ORDER BY from_id",
                json!({}),
            )
            .await?;
        rows.into_iter()
            .map(|row| {
                let wire: WireRelationship = serde_json::from_value(serde_json::Value::Object(row))
                    .map_err(|e| Error::Decode(format!("relationship row: {e}")))?;
                Ok(wire.into())
            })
            .collect()
    }

    async fn node_count(&self, _session: &Neo4jSession) -> Result<u64> {
        let mut rows = self.run("MATCH (n) RETURN count(n) AS count", json!({})).await?;
        match rows.first_mut() {
            Some(row) => column(row, "count"),
            None => Ok(0),
        }
    }

    async fn relationship_count(&self, _session: &Neo4jSession) -> Result<u64> {
        let mut rows = self.run("MATCH ()-[r]->() RETURN count(r) AS count", json!({})).await?;
        match rows.first_mut() {
            Some(row) => column(row, "count"),
            None => Ok(0),
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct CommitResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<CypherError>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    columns: Vec<String>,
    data: Vec<Record>,
}

#[derive(Debug, Deserialize)]
struct Record {
    row: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CypherError {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WireNode {
    id: u64,
    #[serde(rename = "type", default)]
    label: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    properties: serde_json::Value,
}

impl From<WireNode> for Node {
    fn from(wire: WireNode) -> Self {
        let mut node = Node::new(
            NodeId(wire.id),
            wire.label.unwrap_or_default(),
            wire.name.unwrap_or_default(),
        );
        node.properties = property_map::from_json(wire.properties);
        node
    }
}

#[derive(Debug, Deserialize)]
struct WireRelationship {
    from_id: u64,
    #[serde(default)]
    from_name: Option<String>,
    to_id: u64,
    #[serde(default)]
    to_name: Option<String>,
    #[serde(rename = "type")]
    rel_type: String,
    #[serde(default)]
    properties: serde_json::Value,
}

impl From<WireRelationship> for Relationship {
    fn from(wire: WireRelationship) -> Self {
        Relationship {
            from_id: NodeId(wire.from_id),
            from_name: wire.from_name.unwrap_or_default(),
            to_id: NodeId(wire.to_id),
            to_name: wire.to_name.unwrap_or_default(),
            rel_type: wire.rel_type,
            properties: property_map::from_json(wire.properties),
            consistency: None,
        }
    }
}
