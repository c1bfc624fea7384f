// Copyright (c) 2025 - Cowboy AI, Inc.
//! Query and connection configuration
//!
//! [`QueryConfig`] is assembled per call from a sequence of [`QueryOption`]s,
//! applied in order over the defaults:
//!
//! ```
//! use cim_graph_query::config::{with_database, with_readers_routing_control, QueryConfig};
//! use cim_graph_query::RoutingControl;
//!
//! let config = QueryConfig::from_options([
//!     with_database("movies"),
//!     with_readers_routing_control(),
//! ]);
//! assert_eq!(config.database(), Some("movies"));
//! assert_eq!(config.routing(), RoutingControl::Readers);
//! ```
//!
//! [`Neo4jConfig`] holds connection settings and can be loaded from the
//! environment or a JSON file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::bookmarks::BookmarkManager;
use crate::errors::{ConfigError, ConfigResult};
use crate::retry::RetryPolicy;
use crate::routing::RoutingControl;

/// Per-call query configuration
///
/// Defaults: Writers routing, driver default database, no impersonation, no
/// bookmark manager, no timeout.
#[derive(Clone, Default)]
pub struct QueryConfig {
    routing: RoutingControl,
    database: Option<String>,
    impersonated_user: Option<String>,
    bookmark_manager: Option<Arc<dyn BookmarkManager>>,
    timeout: Option<Duration>,
}

impl QueryConfig {
    /// Apply `options` in order over the defaults
    pub fn from_options(options: impl IntoIterator<Item = QueryOption>) -> Self {
        let mut config = Self::default();
        for option in options {
            config.apply(option);
        }
        config
    }

    fn apply(&mut self, option: QueryOption) {
        match option {
            QueryOption::Routing(routing) => self.routing = routing,
            // an empty name means the driver default
            QueryOption::Database(db) => self.database = Some(db).filter(|d| !d.is_empty()),
            QueryOption::ImpersonatedUser(user) => {
                self.impersonated_user = Some(user).filter(|u| !u.is_empty())
            }
            QueryOption::BookmarkManager(manager) => self.bookmark_manager = Some(manager),
            QueryOption::Timeout(timeout) => self.timeout = Some(timeout),
        }
    }

    pub fn routing(&self) -> RoutingControl {
        self.routing
    }

    /// Target database, `None` for the driver default
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn impersonated_user(&self) -> Option<&str> {
        self.impersonated_user.as_deref()
    }

    pub fn bookmark_manager(&self) -> Option<&Arc<dyn BookmarkManager>> {
        self.bookmark_manager.as_ref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl fmt::Debug for QueryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryConfig")
            .field("routing", &self.routing)
            .field("database", &self.database)
            .field("impersonated_user", &self.impersonated_user)
            .field("bookmark_manager", &self.bookmark_manager.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A single field assignment applied to a [`QueryConfig`]
#[derive(Clone)]
pub enum QueryOption {
    Routing(RoutingControl),
    Database(String),
    ImpersonatedUser(String),
    BookmarkManager(Arc<dyn BookmarkManager>),
    Timeout(Duration),
}

impl fmt::Debug for QueryOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOption::Routing(r) => f.debug_tuple("Routing").field(r).finish(),
            QueryOption::Database(db) => f.debug_tuple("Database").field(db).finish(),
            QueryOption::ImpersonatedUser(u) => f.debug_tuple("ImpersonatedUser").field(u).finish(),
            QueryOption::BookmarkManager(_) => f.write_str("BookmarkManager(..)"),
            QueryOption::Timeout(t) => f.debug_tuple("Timeout").field(t).finish(),
        }
    }
}

/// Route the query to the read path
pub fn with_readers_routing_control() -> QueryOption {
    QueryOption::Routing(RoutingControl::Readers)
}

/// Route the query to the write path
pub fn with_writers_routing_control() -> QueryOption {
    QueryOption::Routing(RoutingControl::Writers)
}

/// Run against the named database
pub fn with_database(database: impl Into<String>) -> QueryOption {
    QueryOption::Database(database.into())
}

/// Run on behalf of another user
pub fn with_impersonated_user(user: impl Into<String>) -> QueryOption {
    QueryOption::ImpersonatedUser(user.into())
}

/// Share a bookmark manager with the caller
pub fn with_bookmark_manager(manager: Arc<dyn BookmarkManager>) -> QueryOption {
    QueryOption::BookmarkManager(manager)
}

/// Abort the call, closing the session, once `timeout` elapses
pub fn with_timeout(timeout: Duration) -> QueryOption {
    QueryOption::Timeout(timeout)
}

/// Neo4j connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neo4jConfig {
    /// Neo4j URI (e.g., "bolt://localhost:7687")
    pub uri: String,

    /// Username for authentication
    pub user: String,

    /// Password for authentication
    pub password: String,

    /// Optional database name (defaults to "neo4j")
    #[serde(default)]
    pub database: Option<String>,

    /// Retry policy for managed transactions
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Maximum pooled connections per database
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_max_connections() -> usize {
    16
}

/// Database used when none is configured
pub const DEFAULT_DATABASE: &str = "neo4j";

impl Neo4jConfig {
    /// Create a new Neo4j configuration
    pub fn new(uri: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            user: user.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Set the database name
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Get the database name (defaults to "neo4j" if not set)
    pub fn database(&self) -> &str {
        self.database.as_deref().unwrap_or(DEFAULT_DATABASE)
    }

    /// Load from `NEO4J_URI`, `NEO4J_USER`, `NEO4J_PASSWORD`, `NEO4J_DATABASE`
    /// and `NEO4J_MAX_CONNECTIONS`, falling back to the defaults
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let defaults = Self::default();

        let max_connections = match lookup("NEO4J_MAX_CONNECTIONS") {
            Some(raw) => raw.parse().map_err(|e: std::num::ParseIntError| ConfigError::InvalidEnv {
                name: "NEO4J_MAX_CONNECTIONS".to_string(),
                reason: e.to_string(),
            })?,
            None => defaults.max_connections,
        };

        Ok(Self {
            uri: lookup("NEO4J_URI").unwrap_or(defaults.uri),
            user: lookup("NEO4J_USER").unwrap_or(defaults.user),
            password: lookup("NEO4J_PASSWORD").unwrap_or(defaults.password),
            database: lookup("NEO4J_DATABASE").filter(|db| !db.is_empty()),
            retry: defaults.retry,
            max_connections,
        })
    }

    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Whether the URI scheme asks for an encrypted connection
    pub fn is_encrypted(&self) -> bool {
        uri_is_encrypted(&self.uri)
    }

    /// `host:port` part of the URI
    pub fn address(&self) -> &str {
        let rest = self
            .uri
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.uri);
        rest.split(['/', '?']).next().unwrap_or(rest)
    }
}

/// Whether a `scheme://` URI asks for TLS (`+s`, or `+ssc` for self-signed)
pub fn uri_is_encrypted(uri: &str) -> bool {
    uri.split_once("://")
        .map(|(scheme, _)| scheme.ends_with("+s") || scheme.ends_with("+ssc"))
        .unwrap_or(false)
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "".to_string(),
            database: None,
            retry: RetryPolicy::default(),
            max_connections: default_max_connections(),
        }
    }
}
