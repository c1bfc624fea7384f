// Copyright (c) 2025 - Cowboy AI, Inc.

//! Neo4j session provider backed by `neo4rs`
//!
//! `neo4rs` exposes a connection pool per database ([`Graph`]) and explicit
//! transactions ([`Txn`]), but no sessions and no transaction retry. This
//! module supplies both:
//!
//! - [`Neo4jSessionProvider`] keeps one `Graph` per database name, created
//!   on first use
//! - [`Neo4jSession`] runs each unit of work in a fresh `Txn` under the
//!   configured [`RetryPolicy`], committing on success and rolling back on
//!   failure
//! - [`Neo4jTransaction`] converts `neo4rs` rows into [`Value`]s
//!
//! Impersonation and bookmark managers have no `neo4rs` counterpart and are
//! rejected when a session is opened.
//!
//! `neo4rs` keeps the field list of a result private and hands out rows as
//! maps, so the projection order of a query is not observable here. Keys are
//! reported in lexicographic order instead, which keeps records and the
//! rendered result stable from one run to the next.
//!
//! # Example
//!
//! ```rust,no_run
//! use cim_graph_query::adapters::Neo4jSessionProvider;
//! use cim_graph_query::{params, Driver, Neo4jConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = Neo4jSessionProvider::connect(Neo4jConfig::default()).await?;
//!     let driver = Driver::new(provider);
//!
//!     let result = driver.execute_query("RETURN 42", params! {}, []).await?;
//!     println!("{}", result);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use neo4rs::{BoltMap, BoltString, BoltType, ConfigBuilder, Graph, Query, RowStream, Txn};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Neo4jConfig;
use crate::errors::ExecutionError;
use crate::result::{ProtocolVersion, ResultSummary, ServerInfo};
use crate::retry::{RetryPolicy, Retryable};
use crate::session::{ManagedTransaction, Session, SessionConfig, SessionProvider, TransactionWork};
use crate::value::{Node, Parameters, Path, Relationship, Value};

/// Bolt version spoken by `neo4rs` 0.7
pub const NEGOTIATED_PROTOCOL: ProtocolVersion = ProtocolVersion::new(4, 1);

/// Errors raised by the `neo4rs` session provider
#[derive(Debug, Error)]
pub enum Neo4jError {
    /// Neo4j database error
    #[error("Neo4j database error: {0}")]
    Database(#[from] neo4rs::Error),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Requested feature has no `neo4rs` counterpart
    #[error("Not supported by the neo4rs session provider: {0}")]
    Unsupported(String),

    /// A value could not be converted to or from its bolt form
    #[error("Value conversion error: {0}")]
    Conversion(String),

    /// Local execution fault
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// Result type for the `neo4rs` session provider
pub type Result<T> = std::result::Result<T, Neo4jError>;

impl Retryable for Neo4jError {
    fn is_retryable(&self) -> bool {
        match self {
            Neo4jError::Database(neo4rs::Error::IOError { .. })
            | Neo4jError::Database(neo4rs::Error::ConnectionError)
            | Neo4jError::Connection(_) => true,
            // server failures surface as unexpected responses carrying the status code
            Neo4jError::Database(neo4rs::Error::UnexpectedMessage(message)) => {
                is_retryable_code(message)
            }
            _ => false,
        }
    }
}

fn is_retryable_code(message: &str) -> bool {
    message.contains("Neo.TransientError")
        || message.contains("Neo.ClientError.Cluster.NotALeader")
        || message.contains("Neo.ClientError.General.ForbiddenOnReadOnlyDatabase")
}

/// Session provider over a set of `neo4rs` connection pools
pub struct Neo4jSessionProvider {
    config: Neo4jConfig,
    graphs: Mutex<HashMap<String, Arc<Graph>>>,
    server: ServerInfo,
}

impl Neo4jSessionProvider {
    /// Connect to the configured default database and look up the server agent
    pub async fn connect(config: Neo4jConfig) -> Result<Self> {
        info!("Connecting to Neo4j at {}", config.uri);

        let graph = Arc::new(Self::connect_graph(&config, config.database()).await?);
        let server = ServerInfo {
            address: config.address().to_string(),
            agent: Self::server_agent(&graph).await?,
            protocol_version: NEGOTIATED_PROTOCOL,
        };
        info!("Connected to {} at {}", server.agent, server.address);

        let mut graphs = HashMap::new();
        graphs.insert(config.database().to_string(), graph);

        Ok(Self {
            config,
            graphs: Mutex::new(graphs),
            server,
        })
    }

    async fn connect_graph(config: &Neo4jConfig, database: &str) -> Result<Graph> {
        let graph_config = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.user.as_str())
            .password(config.password.as_str())
            .db(database)
            .max_connections(config.max_connections)
            .build()
            .map_err(|e| Neo4jError::Connection(e.to_string()))?;

        Graph::connect(graph_config)
            .await
            .map_err(|e| Neo4jError::Connection(e.to_string()))
    }

    async fn server_agent(graph: &Graph) -> Result<String> {
        let mut components = graph
            .execute(Query::new(
                "CALL dbms.components() YIELD name, versions RETURN name, versions[0] AS version"
                    .to_string(),
            ))
            .await?;

        match components.next().await? {
            Some(row) => {
                let name: String = row
                    .get("name")
                    .map_err(|e| Neo4jError::Conversion(e.to_string()))?;
                let version: String = row
                    .get("version")
                    .map_err(|e| Neo4jError::Conversion(e.to_string()))?;
                let product = name.strip_suffix(" Kernel").unwrap_or(&name);
                Ok(format!("{}/{}", product, version))
            }
            None => Ok("Neo4j".to_string()),
        }
    }

    /// Pool for `database`, connecting it on first use
    async fn graph_for(&self, database: &str) -> Result<Arc<Graph>> {
        if let Some(graph) = self.graphs.lock().await.get(database) {
            return Ok(Arc::clone(graph));
        }

        debug!("Opening connection pool for database {}", database);
        let graph = Arc::new(Self::connect_graph(&self.config, database).await?);

        let mut graphs = self.graphs.lock().await;
        Ok(Arc::clone(graphs.entry(database.to_string()).or_insert(graph)))
    }

    pub fn config(&self) -> &Neo4jConfig {
        &self.config
    }

    pub fn server(&self) -> &ServerInfo {
        &self.server
    }
}

#[async_trait]
impl SessionProvider for Neo4jSessionProvider {
    type Error = Neo4jError;
    type Session = Neo4jSession;

    async fn new_session(&self, config: SessionConfig) -> Result<Neo4jSession> {
        if let Some(user) = &config.impersonated_user {
            return Err(Neo4jError::Unsupported(format!(
                "impersonating user {}",
                user
            )));
        }
        if config.bookmark_manager.is_some() {
            return Err(Neo4jError::Unsupported("bookmark managers".to_string()));
        }

        let database = config
            .database
            .unwrap_or_else(|| self.config.database().to_string());
        let graph = self.graph_for(&database).await?;

        debug!("Opened session on database {}", database);
        Ok(Neo4jSession {
            graph,
            database,
            server: self.server.clone(),
            retry: self.config.retry.clone(),
            open: true,
        })
    }

    fn target(&self) -> &str {
        &self.config.uri
    }

    async fn verify_connectivity(&self) -> Result<()> {
        let graph = self.graph_for(self.config.database()).await?;
        graph
            .run(Query::new("RETURN 1".to_string()))
            .await
            .map_err(|e| Neo4jError::Connection(format!("Neo4j health check failed: {}", e)))?;

        debug!("Neo4j health check passed");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut graphs = self.graphs.lock().await;
        info!("Releasing {} Neo4j connection pools", graphs.len());
        graphs.clear();
        Ok(())
    }
}

/// Session bound to one database pool
pub struct Neo4jSession {
    graph: Arc<Graph>,
    database: String,
    server: ServerInfo,
    retry: RetryPolicy,
    open: bool,
}

impl Neo4jSession {
    pub fn database(&self) -> &str {
        &self.database
    }

    async fn execute<W>(&mut self, access_mode: &str, work: &W) -> Result<W::Output>
    where
        W: TransactionWork<Neo4jTransaction>,
    {
        if !self.open {
            return Err(ExecutionError::SessionClosed.into());
        }

        let Self {
            graph,
            database,
            server,
            retry,
            ..
        } = &*self;

        debug!("Running {} transaction on {}", access_mode, database);
        retry
            .run(move || async move {
                let txn = graph.start_txn().await?;
                let mut tx = Neo4jTransaction::new(txn, database.clone(), server.clone());

                match work.run(&mut tx).await {
                    Ok(output) => {
                        tx.commit().await?;
                        Ok(output)
                    }
                    Err(e) => {
                        if let Err(rollback_error) = tx.rollback().await {
                            warn!("Rollback after failed unit of work also failed: {}", rollback_error);
                        }
                        Err(e)
                    }
                }
            })
            .await
    }
}

#[async_trait]
impl Session for Neo4jSession {
    type Error = Neo4jError;
    type Transaction = Neo4jTransaction;

    async fn execute_write<W>(&mut self, work: &W) -> Result<W::Output>
    where
        W: TransactionWork<Neo4jTransaction>,
    {
        self.execute("write", work).await
    }

    // neo4rs has no server-side routing for bolt:// targets, so both paths
    // share the same pool
    async fn execute_read<W>(&mut self, work: &W) -> Result<W::Output>
    where
        W: TransactionWork<Neo4jTransaction>,
    {
        self.execute("read", work).await
    }

    async fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            debug!("Closed session on database {}", self.database);
        }
        Ok(())
    }
}

/// A `neo4rs` transaction running one result at a time
///
/// Row streams do not expose the result's fields, so `keys` pulls the first
/// row and takes its column names in lexicographic order. A result without
/// rows has no keys.
pub struct Neo4jTransaction {
    txn: Txn,
    database: String,
    server: ServerInfo,
    stream: Option<RowStream>,
    keys: Option<Vec<String>>,
    pending: Option<BoltMap>,
}

impl Neo4jTransaction {
    fn new(txn: Txn, database: String, server: ServerInfo) -> Self {
        Self {
            txn,
            database,
            server,
            stream: None,
            keys: None,
            pending: None,
        }
    }

    async fn pull(&mut self) -> Result<Option<BoltMap>> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(Neo4jError::Conversion("no query is running".to_string()));
        };

        match stream.next(self.txn.handle()).await? {
            Some(row) => row
                .to_strict::<BoltMap>()
                .map(Some)
                .map_err(|e| Neo4jError::Conversion(e.to_string())),
            None => Ok(None),
        }
    }

    async fn commit(self) -> Result<()> {
        drop(self.stream);
        Ok(self.txn.commit().await?)
    }

    async fn rollback(self) -> Result<()> {
        drop(self.stream);
        Ok(self.txn.rollback().await?)
    }
}

/// Column names of a row, sorted
fn row_keys(row: &BoltMap) -> Vec<String> {
    let mut keys: Vec<String> = row.value.keys().map(|k| k.value.clone()).collect();
    keys.sort();
    keys
}

/// Values of `row` in the order of `keys`
fn row_values(keys: &[String], mut row: BoltMap) -> Result<Vec<Value>> {
    let values = keys
        .iter()
        .map(|key| match row.value.remove(&BoltString::from(key.as_str())) {
            Some(value) => from_bolt(value),
            None => Err(Neo4jError::Conversion(format!("row has no column {}", key))),
        })
        .collect::<Result<Vec<Value>>>()?;

    if !row.value.is_empty() {
        return Err(Neo4jError::Conversion(format!(
            "row has columns outside the result keys: {:?}",
            row_keys(&row)
        )));
    }
    Ok(values)
}

#[async_trait]
impl ManagedTransaction for Neo4jTransaction {
    type Error = Neo4jError;

    async fn run(&mut self, query: &str, parameters: &Parameters) -> Result<()> {
        let mut q = Query::new(query.to_string());
        for (name, value) in parameters {
            q = q.param(name, to_bolt(value)?);
        }

        self.stream = Some(self.txn.execute(q).await?);
        self.keys = None;
        self.pending = None;
        Ok(())
    }

    async fn keys(&mut self) -> Result<Vec<String>> {
        if let Some(keys) = &self.keys {
            return Ok(keys.clone());
        }

        let first = self.pull().await?;
        let keys = first.as_ref().map(row_keys).unwrap_or_default();

        self.keys = Some(keys.clone());
        self.pending = first;
        Ok(keys)
    }

    async fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        if self.keys.is_none() {
            self.keys().await?;
        }

        let row = match self.pending.take() {
            Some(row) => Some(row),
            None => self.pull().await?,
        };

        match row {
            Some(row) => Ok(Some(row_values(self.keys.as_deref().unwrap_or_default(), row)?)),
            None => Ok(None),
        }
    }

    async fn consume(&mut self) -> Result<ResultSummary> {
        self.pending = None;
        if self.stream.is_some() {
            while self.pull().await?.is_some() {}
        }
        self.stream = None;

        Ok(ResultSummary {
            database: self.database.clone(),
            server: self.server.clone(),
        })
    }
}

fn bolt_map(map: BoltMap) -> Result<BTreeMap<String, Value>> {
    map.value
        .into_iter()
        .map(|(k, v)| Ok((k.value, from_bolt(v)?)))
        .collect()
}

fn bolt_labels(labels: &neo4rs::BoltList) -> Vec<String> {
    labels
        .value
        .iter()
        .filter_map(|label| match label {
            BoltType::String(s) => Some(s.value.clone()),
            _ => None,
        })
        .collect()
}

fn bolt_node(node: neo4rs::BoltNode) -> Result<Node> {
    Ok(Node {
        id: node.id.value,
        labels: bolt_labels(&node.labels),
        properties: bolt_map(node.properties)?,
    })
}

/// A relationship of a path, before its endpoints are known
#[derive(Debug, Clone, PartialEq)]
struct PathSegment {
    id: i64,
    rel_type: String,
    properties: BTreeMap<String, Value>,
}

fn bolt_path(path: neo4rs::BoltPath) -> Result<Path> {
    let nodes = path
        .nodes()
        .into_iter()
        .map(bolt_node)
        .collect::<Result<Vec<Node>>>()?;
    let segments = path
        .rels()
        .into_iter()
        .map(|rel| {
            Ok(PathSegment {
                id: rel.id.value,
                rel_type: rel.typ.value,
                properties: bolt_map(rel.properties)?,
            })
        })
        .collect::<Result<Vec<PathSegment>>>()?;
    let indices: Vec<i64> = path.indices().into_iter().map(|i| i.value).collect();

    assemble_path(nodes, segments, &indices)
}

/// Walk the bolt path encoding
///
/// `indices` alternates a 1-based relationship index, negative when the
/// relationship points backwards, with a 0-based index of the next node.
fn assemble_path(nodes: Vec<Node>, segments: Vec<PathSegment>, indices: &[i64]) -> Result<Path> {
    if indices.len() % 2 != 0 {
        return Err(Neo4jError::Conversion(
            "path indices must come in pairs".to_string(),
        ));
    }
    let Some(first) = nodes.first() else {
        return Ok(Path {
            nodes: vec![],
            relationships: vec![],
        });
    };

    let out_of_range = |what: &str, index: i64| {
        Neo4jError::Conversion(format!("path {} index {} out of range", what, index))
    };

    let mut walked = vec![first.clone()];
    let mut relationships = Vec::with_capacity(indices.len() / 2);
    for pair in indices.chunks_exact(2) {
        let (rel_index, node_index) = (pair[0], pair[1]);
        let segment = usize::try_from(rel_index.unsigned_abs())
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| segments.get(i))
            .ok_or_else(|| out_of_range("relationship", rel_index))?;
        let next = usize::try_from(node_index)
            .ok()
            .and_then(|i| nodes.get(i))
            .ok_or_else(|| out_of_range("node", node_index))?;
        let previous = walked.last().map(|n| n.id).unwrap_or(first.id);

        let (start_node_id, end_node_id) = if rel_index > 0 {
            (previous, next.id)
        } else {
            (next.id, previous)
        };
        relationships.push(Relationship {
            id: segment.id,
            start_node_id,
            end_node_id,
            rel_type: segment.rel_type.clone(),
            properties: segment.properties.clone(),
        });
        walked.push(next.clone());
    }

    Ok(Path {
        nodes: walked,
        relationships,
    })
}

fn temporal<T>(value: BoltType) -> Result<T>
where
    T: TryFrom<BoltType, Error = neo4rs::Error>,
{
    T::try_from(value).map_err(|e| Neo4jError::Conversion(e.to_string()))
}

/// Convert a bolt value into a [`Value`]
///
/// Spatial, duration and time-only values have no [`Value`] variant and are
/// carried as their debug representation.
pub fn from_bolt(value: BoltType) -> Result<Value> {
    Ok(match value {
        BoltType::Null(_) => Value::Null,
        BoltType::Boolean(b) => Value::Boolean(b.value),
        BoltType::Integer(i) => Value::Integer(i.value),
        BoltType::Float(f) => Value::Float(f.value),
        BoltType::String(s) => Value::String(s.value),
        BoltType::Bytes(b) => Value::Bytes(b.value.to_vec()),
        BoltType::List(list) => Value::List(
            list.value
                .into_iter()
                .map(from_bolt)
                .collect::<Result<Vec<Value>>>()?,
        ),
        BoltType::Map(map) => Value::Map(bolt_map(map)?),
        BoltType::Node(node) => Value::Node(bolt_node(node)?),
        BoltType::Relation(rel) => Value::Relationship(Relationship {
            id: rel.id.value,
            start_node_id: rel.start_node_id.value,
            end_node_id: rel.end_node_id.value,
            rel_type: rel.typ.value,
            properties: bolt_map(rel.properties)?,
        }),
        BoltType::Path(path) => Value::Path(bolt_path(path)?),
        date @ BoltType::Date(_) => Value::Date(temporal(date)?),
        local @ BoltType::LocalDateTime(_) => Value::LocalDateTime(temporal(local)?),
        zoned @ BoltType::DateTime(_) => Value::DateTime(temporal(zoned)?),
        other => Value::String(format!("{:?}", other)),
    })
}

/// Convert a parameter into its bolt form
pub fn to_bolt(value: &Value) -> Result<BoltType> {
    Ok(match value {
        Value::Null => BoltType::Null(neo4rs::BoltNull),
        Value::Boolean(b) => BoltType::from(*b),
        Value::Integer(i) => BoltType::from(*i),
        Value::Float(f) => BoltType::from(*f),
        Value::String(s) => BoltType::from(s.clone()),
        Value::List(items) => {
            let converted = items.iter().map(to_bolt).collect::<Result<Vec<BoltType>>>()?;
            BoltType::from(converted)
        }
        Value::Map(map) => {
            let converted = map
                .iter()
                .map(|(k, v)| Ok((k.clone(), to_bolt(v)?)))
                .collect::<Result<HashMap<String, BoltType>>>()?;
            BoltType::from(converted)
        }
        Value::Date(date) => BoltType::from(*date),
        Value::LocalDateTime(dt) => BoltType::from(*dt),
        Value::DateTime(dt) => BoltType::from(*dt),
        other => {
            return Err(Neo4jError::Conversion(format!(
                "{} values cannot be sent as parameters",
                other.type_name()
            )))
        }
    })
}
